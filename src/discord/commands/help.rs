use super::{lookup, Reply, COMMANDS, PREFIX};

pub fn run(args: &[&str]) -> Reply {
    match args {
        [] => {
            let mut list = "```\n".to_string();
            for command in COMMANDS {
                list += &format!("{}{}:\t{}\n", PREFIX, command.name, command.summary);
            }
            list += "```";
            Reply::Text(list)
        }
        [name] => {
            let name = name.trim_start_matches(PREFIX);
            let Some(command) = lookup(name) else {
                return Reply::text(format!("No command named {:?}", name));
            };

            let mut help = format!(
                "```\n{}{}: {}\n\nExamples:\n\n",
                PREFIX, command.name, command.summary
            );
            for (example, description) in command.examples {
                help += &format!("{}\n\t{}\n", example, description);
            }
            help += "```";
            Reply::Text(help)
        }
        _ => Reply::text("usage: !help [command]"),
    }
}
