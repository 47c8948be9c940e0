use crate::CLAP_STYLING;
use clap::{arg, command};

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("station")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("station")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner, progress spinner and status lines").required(false))
        .subcommand_required(false)
        .subcommand(command!("list").about("List the available bots"))
        .subcommand(
            command!("run")
                .about("Run a bot with positional parameters")
                .arg(
                    arg!(<BOT>)
                        .required(true)
                        .help("Name of the bot to run (see `station list`)"),
                )
                .arg(
                    arg!(-p --"params" <PARAMS>)
                        .required(false)
                        .num_args(1..)
                        .help(
                            "Positional bot parameters, e.g. for site_mapper: \
                        <start_url> [max_depth] [same_domain_only]",
                        ),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        )
}
