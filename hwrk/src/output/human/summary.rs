use std::fmt::Write as _;

use hwrk_core::{AggregateReport, ErrorKind};

use super::format::{format_byte_rate, format_bytes, format_latency, format_rate};

pub(crate) fn render(report: &AggregateReport) -> String {
    let mut out = String::new();

    let Some(metrics) = report.metrics() else {
        out.push_str("Error: no data collected (not a single request succeeded)\n");
        writeln!(
            &mut out,
            "{} requests in {:.2}s, all failed",
            report.requests_total(),
            report.elapsed.as_secs_f64()
        )
        .ok();
        render_errors(report, &mut out);
        return out;
    };

    writeln!(
        &mut out,
        "{} requests in {:.2}s, {} read",
        report.success_count,
        report.elapsed.as_secs_f64(),
        format_bytes(report.total_response_bytes)
    )
    .ok();
    if report.redirect_success_count > 0 {
        writeln!(
            &mut out,
            "  ({} of them answered with a redirect)",
            report.redirect_success_count
        )
        .ok();
    }

    writeln!(&mut out, "Requests/sec:\t\t{}", format_rate(metrics.requests_per_second)).ok();
    writeln!(&mut out, "Transfer/sec:\t\t{}", format_byte_rate(metrics.bytes_per_second)).ok();
    writeln!(&mut out, "Avg Req Time:\t\t{}", format_latency(metrics.mean_latency)).ok();
    if let Some(min) = report.min_latency {
        writeln!(&mut out, "Fastest Request:\t{}", format_latency(min)).ok();
    }
    if let Some(max) = report.max_latency {
        writeln!(&mut out, "Slowest Request:\t{}", format_latency(max)).ok();
    }
    writeln!(&mut out, "Number of Errors:\t{}", report.error_count).ok();

    let l = &metrics.latency;
    out.push_str("\nLatency distribution\n");
    for (label, value) in [
        ("50%", l.p50),
        ("75%", l.p75),
        ("90%", l.p90),
        ("95%", l.p95),
        ("99%", l.p99),
    ] {
        writeln!(&mut out, "  {label:>4}  {}", format_latency(value)).ok();
    }
    writeln!(&mut out, "  stdev {}", format_latency(l.stdev)).ok();

    let clamped = report.histogram.clamped();
    if clamped > 0 {
        writeln!(
            &mut out,
            "  ({clamped} sample(s) were outside the histogram range and clamped)"
        )
        .ok();
    }

    render_errors(report, &mut out);
    out
}

fn render_errors(report: &AggregateReport, out: &mut String) {
    if report.error_tally.is_empty() {
        return;
    }

    out.push_str("\nErrors\n");

    // Most frequent first; ties keep the tally's own order.
    let mut errors: Vec<(&ErrorKind, &u64)> = report.error_tally.iter().collect();
    errors.sort_by(|(_, a), (_, b)| b.cmp(a));

    for (kind, count) in errors {
        writeln!(out, "  {count:>8}  [{}] {kind}", kind.class()).ok();
    }
}
