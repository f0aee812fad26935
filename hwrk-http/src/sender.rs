use hwrk_core::{OutboundRequest, RequestSender, SendError, SendResult};

use crate::{Error, HttpClient};

impl RequestSender for HttpClient {
    async fn send(&self, req: &OutboundRequest) -> SendResult {
        match self.request(req).await {
            Ok(res) => Ok(res.head()),
            Err(err @ Error::RedirectRefused { .. }) => Err(SendError::Redirected(err.to_string())),
            Err(err) => Err(SendError::Transport(err.detailed_message())),
        }
    }
}
