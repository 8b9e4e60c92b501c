use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock time as fractional Unix seconds; this is the value embedded in
/// outgoing packets and compared against on receive.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_secs_f64()
}

/// Print error message and exit with error code
pub fn exit_with_error(message: &str, code: i32) -> ! {
    eprintln!("pinger: {}", message);
    process::exit(code);
}

/// Validate ping parameters before any socket work starts.
pub fn validate_ping_params(count: u32, timeout: u64, message: &str) -> anyhow::Result<()> {
    let _ = count; // zero attempts is a valid (empty) run
    if timeout == 0 {
        return Err(anyhow::anyhow!("timeout must be greater than 0 seconds"));
    }
    if message.len() > 65500 {
        return Err(anyhow::anyhow!(
            "message too large, maximum is 65500 bytes"
        ));
    }
    Ok(())
}
