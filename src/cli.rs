// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, crate_version, value_parser};

fn json_flags(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print JSON"),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .conflicts_with("json")
            .help("Print one JSON object per line"),
    )
}

fn id_arg() -> Arg {
    Arg::new("id").required(true).help("Record id")
}

fn image_arg() -> Arg {
    Arg::new("image")
        .long("image")
        .value_name("PATH|URL")
        .help("Attach an image: a local file is inlined, anything else is stored as given")
}

/// Fields shared by `tx add` and `tx edit`. Defaults are applied by the
/// handler for `add` only.
fn tx_fields(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("type")
            .long("type")
            .value_name("income|expense")
            .help("Money in or out (default: expense)"),
    )
    .arg(
        Arg::new("date")
            .long("date")
            .value_name("YYYY-MM-DD")
            .help("Transaction date (default: today)"),
    )
    .arg(
        Arg::new("amount")
            .long("amount")
            .help("Total amount; derived from quantity × unit price when both are given"),
    )
    .arg(Arg::new("quantity").long("quantity").short('q'))
    .arg(Arg::new("unit-price").long("unit-price"))
    .arg(Arg::new("unit").long("unit"))
    .arg(
        Arg::new("category")
            .long("category")
            .short('c')
            .help("Category (default: Vật liệu)"),
    )
    .arg(Arg::new("description").long("description").short('d'))
    .arg(Arg::new("supplier").long("supplier"))
    .arg(
        Arg::new("paid")
            .long("paid")
            .action(ArgAction::SetTrue)
            .help("Mark an expense as paid"),
    )
    .arg(
        Arg::new("unpaid")
            .long("unpaid")
            .action(ArgAction::SetTrue)
            .conflicts_with("paid")
            .help("Mark an expense as still owed"),
    )
    .arg(image_arg())
}

fn material_fields(cmd: Command) -> Command {
    cmd.arg(Arg::new("name").long("name"))
        .arg(Arg::new("unit").long("unit").help("Unit (default: Cái)"))
        .arg(Arg::new("quantity").long("quantity").short('q'))
        .arg(Arg::new("unit-price").long("unit-price"))
        .arg(Arg::new("supplier").long("supplier"))
        .arg(image_arg())
}

fn suggestion_kind() -> Arg {
    Arg::new("list")
        .required(true)
        .value_parser(["suppliers", "materials", "units"])
        .help("Which suggestion list")
}

pub fn build_cli() -> Command {
    Command::new("sitebook")
        .about("Track a construction site's budget, spending and material stock in a shared spreadsheet")
        .version(crate_version!())
        .arg(
            Arg::new("endpoint")
                .long("endpoint")
                .global(true)
                .value_name("URL")
                .help("Use this web app endpoint for this run only"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log what is being sent and received"),
        )
        .subcommand(Command::new("init").about("Create the local cache and print its location"))
        .subcommand(json_flags(
            Command::new("dashboard").about("Budget, spending, balance and inventory at a glance"),
        ))
        .subcommand(
            Command::new("tx")
                .about("Income and expense records")
                .subcommand(
                    tx_fields(Command::new("add").about("Record a transaction"))
                        .mut_arg("description", |a| a.required(true)),
                )
                .subcommand(tx_fields(
                    Command::new("edit")
                        .about("Change fields of a transaction")
                        .arg(id_arg()),
                ))
                .subcommand(
                    Command::new("rm")
                        .about("Delete a transaction")
                        .arg(id_arg()),
                )
                .subcommand(json_flags(
                    Command::new("list")
                        .about("List transactions, newest first")
                        .arg(
                            Arg::new("type")
                                .long("type")
                                .default_value("all")
                                .value_name("all|income|expense"),
                        )
                        .arg(
                            Arg::new("search")
                                .long("search")
                                .short('s')
                                .help("Match description or category, ignoring case"),
                        )
                        .arg(
                            Arg::new("limit")
                                .long("limit")
                                .value_parser(value_parser!(usize)),
                        ),
                )),
        )
        .subcommand(
            Command::new("material")
                .about("Material inventory")
                .subcommand(
                    material_fields(Command::new("add").about("Add a material to the inventory"))
                        .mut_arg("name", |a| a.required(true))
                        .mut_arg("quantity", |a| a.required(true))
                        .mut_arg("unit-price", |a| a.required(true)),
                )
                .subcommand(material_fields(
                    Command::new("edit")
                        .about("Change fields of a material")
                        .arg(id_arg()),
                ))
                .subcommand(
                    Command::new("rm")
                        .about("Delete a material")
                        .arg(id_arg()),
                )
                .subcommand(json_flags(
                    Command::new("list")
                        .about("List materials")
                        .arg(Arg::new("search").long("search").short('s')),
                )),
        )
        .subcommand(
            Command::new("budget")
                .about("Initial site budget")
                .subcommand(
                    Command::new("set")
                        .about("Set the initial budget")
                        .arg(Arg::new("amount").required(true)),
                ),
        )
        .subcommand(
            Command::new("suggest")
                .about("Suggestion lists for suppliers, material names and units")
                .subcommand(
                    json_flags(Command::new("list").about("Show a suggestion list"))
                        .arg(suggestion_kind()),
                )
                .subcommand(
                    Command::new("add")
                        .about("Add an entry to a suggestion list, saved on this device")
                        .arg(suggestion_kind())
                        .arg(Arg::new("value").required(true)),
                ),
        )
        .subcommand(
            Command::new("background")
                .about("Dashboard background image")
                .subcommand(Command::new("show").about("Print the current background image source"))
                .subcommand(
                    Command::new("set")
                        .about("Change the background image (admin only)")
                        .arg(
                            Arg::new("image")
                                .required(true)
                                .value_name("PATH|URL"),
                        )
                        .arg(Arg::new("user").long("user").required(true))
                        .arg(Arg::new("password").long("password").required(true)),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Local settings")
                .subcommand(
                    Command::new("endpoint")
                        .about("Show the endpoint, or switch to a new one and reload")
                        .arg(Arg::new("url")),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Write records to a file")
                .subcommand(export_cmd("transactions"))
                .subcommand(export_cmd("materials")),
        )
}

fn export_cmd(name: &'static str) -> Command {
    Command::new(name)
        .arg(
            Arg::new("format")
                .long("format")
                .default_value("csv")
                .help("csv|json"),
        )
        .arg(Arg::new("out").long("out").required(true))
}
