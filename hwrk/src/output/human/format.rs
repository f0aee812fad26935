use std::time::Duration;

pub(crate) fn format_bytes(b: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * 1024 * 1024;

    if b >= GIB {
        return format!("{:.2}GiB", (b as f64) / (GIB as f64));
    }
    if b >= MIB {
        return format!("{:.2}MiB", (b as f64) / (MIB as f64));
    }
    if b >= KIB {
        return format!("{:.2}KiB", (b as f64) / (KIB as f64));
    }

    format!("{b}B")
}

/// Like [`format_bytes`] for a per-second figure; fractional rates round down.
pub(crate) fn format_byte_rate(v: f64) -> String {
    if v.is_finite() && v > 0.0 {
        format!("{}/s", format_bytes(v as u64))
    } else {
        "0B/s".to_string()
    }
}

pub(crate) fn format_rate(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.2}")
    } else {
        "0.00".to_string()
    }
}

/// Single rounded unit, one of us, ms or s.
pub(crate) fn format_duration(d: Duration) -> String {
    let total_ns = d.as_nanos();

    const NS_PER_US: u128 = 1_000;
    const NS_PER_MS: u128 = 1_000_000;
    const NS_PER_S: u128 = 1_000_000_000;

    fn round_div(value: u128, unit: u128) -> u128 {
        // Ties round up.
        (value + (unit / 2)) / unit
    }

    if total_ns >= NS_PER_S {
        return format!("{}s", round_div(total_ns, NS_PER_S));
    }
    if total_ns >= NS_PER_MS {
        return format!("{}ms", round_div(total_ns, NS_PER_MS));
    }

    format!("{}us", round_div(total_ns, NS_PER_US))
}

/// Latency figures keep millisecond decimals, e.g. `12.345ms`.
pub(crate) fn format_latency(d: Duration) -> String {
    let micros = d.as_micros();
    if micros >= 1_000_000 {
        return format!("{:.3}s", d.as_secs_f64());
    }
    if micros >= 1_000 {
        return format!("{:.3}ms", d.as_secs_f64() * 1_000.0);
    }
    format!("{micros}us")
}
