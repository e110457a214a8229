use chrono::Utc;

use crate::schedule::{Availability, Player, Week};
use crate::state::BotState;

use super::{CommandError, EmbedView, Invocation, Reply};

const NUMBER_EMOTES: [&str; 11] = [
    ":zero:",
    ":one:",
    ":two:",
    ":three:",
    ":four:",
    ":five:",
    ":six:",
    ":seven:",
    ":eight:",
    ":nine:",
    ":keycap_ten:",
];

fn number_emote(number: u32) -> String {
    match NUMBER_EMOTES.get(number as usize) {
        Some(emote) => emote.to_string(),
        None => format!("**{}**", number),
    }
}

fn activity_emoji(activity: &str) -> String {
    match activity.chars().next() {
        Some(first) if activity != "TBD" && first.is_ascii_alphabetic() => {
            format!(":regional_indicator_{}:", first.to_ascii_lowercase())
        }
        _ => ":grey_question:".to_string(),
    }
}

fn availability_emoji(availability: Availability) -> &'static str {
    match availability {
        Availability::Yes => ":white_check_mark:",
        Availability::Maybe => ":grey_question:",
        Availability::No => ":x:",
        Availability::Blank => ":black_large_square:",
    }
}

fn role_emoji(role: &str) -> &'static str {
    match role {
        "Tanks" => ":shield:",
        "DPS" => ":crossed_swords:",
        "Supports" => ":ambulance:",
        "Coaches" => ":books:",
        "Flex" => ":muscle:",
        _ => "",
    }
}

fn with_role(role: &str, name: &str) -> String {
    format!("{} {}", role_emoji(role), name).trim_start().to_string()
}

fn base_embed(title: String, link: &str, week: &Week, times_title: &str) -> EmbedView {
    let times = (0..week.blocks())
        .map(|block| number_emote(week.block_hour(block)))
        .collect::<Vec<_>>()
        .join(", ");

    EmbedView {
        title,
        link: Some(link.to_string()),
        footer: Some(format!("Times shown in {}", week.timezone)),
        fields: vec![(times_title.to_string(), times, false)],
    }
}

/// Days in display order, starting today.
fn days_from(today: usize) -> impl Iterator<Item = usize> {
    (0..7).map(move |offset| (today + offset) % 7)
}

pub fn week_embed(week: &Week, link: &str, today: usize) -> EmbedView {
    let mut embed = base_embed(format!("Week of {}", week.date), link, week, "Times");

    for day in days_from(today) {
        let name = if day == today {
            format!("**{}**", week.days[day])
        } else {
            week.days[day].clone()
        };
        let activities = week
            .activities_on(day)
            .into_iter()
            .map(activity_emoji)
            .collect::<Vec<_>>()
            .join(", ");

        embed.fields.push((name, activities, false));
    }

    embed
}

pub fn today_embed(week: &Week, players: &[Player], link: &str, today: usize) -> EmbedView {
    let mut embed = base_embed(
        format!("Schedule for {}", week.days[today]),
        link,
        week,
        "Players",
    );

    /* Yes answers per block, per role, in roster order. */
    let mut roles: Vec<(&str, Vec<u32>)> = Vec::new();
    for player in players {
        let index = match roles.iter().position(|(role, _)| *role == player.role) {
            Some(index) => index,
            None => {
                roles.push((player.role.as_str(), vec![0; week.blocks()]));
                roles.len() - 1
            }
        };

        let mut emojis = Vec::new();
        for block in 0..week.blocks() {
            let availability = player.availability_at(today, block);
            if availability == Availability::Yes {
                roles[index].1[block] += 1;
            }
            emojis.push(availability_emoji(availability));
        }

        embed
            .fields
            .push((with_role(&player.role, &player.name), emojis.join(", "), false));
    }

    for (role, counts) in roles {
        let counts = counts
            .into_iter()
            .map(number_emote)
            .collect::<Vec<_>>()
            .join(", ");
        embed.fields.push((with_role(role, role), counts, false));
    }

    embed
}

pub fn unscheduled_embed(week: &Week, link: &str, today: usize) -> EmbedView {
    let mut embed = base_embed("Open Scrims".to_string(), link, week, "Times");

    for day in days_from(today) {
        let open = week.grid[day]
            .iter()
            .map(|cell| {
                if cell.value == "Scrim" && cell.note.is_empty() {
                    ":regional_indicator_o:"
                } else {
                    ":black_large_square:"
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        embed.fields.push((week.days[day].clone(), open, false));
    }

    embed
}

pub async fn run(
    bot: &BotState,
    at: &Invocation,
    args: &[&str],
) -> Result<Reply, CommandError> {
    let [what] = args else {
        return Ok(Reply::text("usage: !get week|today|unscheduled"));
    };

    let (_, schedule) = bot.team_schedule(at.guild()?, at.channel_id).await?;
    let offset = bot.config().await.utc_offset;

    let data = schedule.read().await;
    if data.last_modified.is_none() {
        return Ok(Reply::text(
            "The schedule is not loaded yet; try again after !update.",
        ));
    }
    let today = data.week.today(&Utc::now().with_timezone(&offset));
    let link = schedule.link();

    let embed = match *what {
        "week" => week_embed(&data.week, &link, today),
        "today" => today_embed(&data.week, &data.players, &link, today),
        "unscheduled" => unscheduled_embed(&data.week, &link, today),
        _ => return Ok(Reply::text("usage: !get week|today|unscheduled")),
    };
    Ok(Reply::Embed(embed))
}
