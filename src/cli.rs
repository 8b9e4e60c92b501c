use clap::{Arg, Command};

#[derive(Debug, Clone)]
pub struct PingArgs {
    pub target: String,
    pub count: u32,
    pub timeout: u64,
    pub message: String,
}

pub fn build_cli() -> Command {
    Command::new("pinger")
        .version("0.1.0")
        .about("Ping a remote host with ICMP Echo Requests")
        .arg(
            Arg::new("target")
                .help("Target hostname or IP address")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("count")
                .short('c')
                .long("count")
                .help("Number of pings to send")
                .value_name("count")
                .default_value("3")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .help("Max seconds to wait for each reply")
                .value_name("seconds")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("message")
                .short('m')
                .long("message")
                .help("Message to be sent")
                .value_name("message")
                .default_value(""),
        )
}

pub fn parse_args() -> anyhow::Result<PingArgs> {
    args_from_matches(&build_cli().get_matches())
}

fn args_from_matches(matches: &clap::ArgMatches) -> anyhow::Result<PingArgs> {
    Ok(PingArgs {
        target: matches
            .get_one::<String>("target")
            .ok_or_else(|| anyhow::anyhow!("target is required"))?
            .clone(),
        count: *matches.get_one::<u32>("count").unwrap_or(&3),
        timeout: *matches.get_one::<u64>("timeout").unwrap_or(&5),
        message: matches
            .get_one::<String>("message")
            .cloned()
            .unwrap_or_default(),
    })
}
