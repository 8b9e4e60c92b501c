mod cli;
mod dns;
mod error;
mod icmp;
mod session;
mod utils;

use session::Session;

#[tokio::main]
async fn main() {
    // Enable debug logging if RUST_LOG is set
    if std::env::var("RUST_LOG").is_ok() {
        env_logger::init();
    }

    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            utils::exit_with_error(&format!("argument error: {}", e), 2);
        }
    };

    if let Err(e) = utils::validate_ping_params(args.count, args.timeout, &args.message) {
        utils::exit_with_error(&e.to_string(), 2);
    }

    // Resolve before any packet goes out; an unresolvable target aborts
    // with zero attempts performed.
    let addr = match dns::resolve_ipv4(&args.target).await {
        Ok(addr) => addr,
        Err(e) => {
            utils::exit_with_error(&e.to_string(), 1);
        }
    };

    let mut session = Session::new(args.target, addr, args.count, args.timeout, &args.message);
    if let Err(e) = session.run().await {
        utils::exit_with_error(&e.to_string(), 1);
    }
}
