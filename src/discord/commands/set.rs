use std::ops::Range;

use crate::schedule::{cell_write, ScheduleData, Week, WriteTarget};
use crate::sheets::{CellField, CellWrite};
use crate::state::BotState;

use super::{CommandError, Invocation, Reply};

const RESPONSES: [&str; 3] = ["Yes", "Maybe", "No"];
const CLEAR_WORDS: [&str; 3] = ["empty", "none", "blank"];
const NOT_LOADED: &str = "The schedule is not loaded yet; try again after !update.";

fn parse_hour(text: &str) -> Option<u32> {
    if text.is_empty() || text.len() > 2 {
        return None;
    }
    text.parse().ok()
}

/// Blocks addressed by an optional leading `"4-6"` range or single hour,
/// and the arguments after it. Without either, every block is addressed.
pub fn select_blocks<'a, 'b>(
    week: &Week,
    args: &'a [&'b str],
) -> Result<(Range<usize>, &'a [&'b str]), String> {
    let Some((first, rest)) = args.split_first() else {
        return Ok((0..week.blocks(), args));
    };

    if let Some((start, end)) = first.split_once('-') {
        if let (Some(start), Some(end)) = (parse_hour(start), parse_hour(end)) {
            if start < week.start_time {
                return Err(format!("Invalid start time {}.", start));
            }
            if end <= start {
                return Err(format!("Invalid time range {}.", first));
            }
            let first_block = week
                .block_at(start)
                .ok_or_else(|| format!("{} does not line up with the blocks.", first))?;
            if (end - start) % week.block_length != 0 {
                return Err(format!("{} does not line up with the blocks.", first));
            }

            let last_block = first_block + ((end - start) / week.block_length) as usize;
            if last_block > week.blocks() {
                return Err(format!("{} goes past the last block.", first));
            }
            return Ok((first_block..last_block, rest));
        }
    }

    if let Some(hour) = parse_hour(first) {
        let block = week
            .block_at(hour)
            .ok_or_else(|| format!("No block starts at {}.", hour))?;
        return Ok((block..block + 1, rest));
    }

    Ok((0..week.blocks(), args))
}

/// Comma separated values, matched case-insensitively against `valid`
/// unless it is empty.
pub fn parse_values<S: AsRef<str>>(args: &[&str], valid: &[S]) -> Result<Vec<String>, String> {
    let joined = args.join(" ");
    let values: Vec<&str> = joined.split(',').map(str::trim).collect();
    if values.iter().all(|value| value.is_empty()) {
        return Err("No values given.".to_string());
    }

    if valid.is_empty() {
        return Ok(values.into_iter().map(str::to_string).collect());
    }

    values
        .into_iter()
        .map(|value| {
            valid
                .iter()
                .map(|candidate| candidate.as_ref())
                .find(|candidate| candidate.eq_ignore_ascii_case(value))
                .map(str::to_string)
                .ok_or_else(|| format!("Invalid value {:?}.", value))
        })
        .collect()
}

/// One value per cell: a single value fills every cell.
pub fn spread(values: Vec<String>, cells: usize) -> Result<Vec<String>, String> {
    match values.len() {
        1 => Ok(vec![values[0].clone(); cells]),
        count if count == cells => Ok(values),
        count => Err(format!(
            "Input mismatch; {} cells but {} values.",
            cells, count
        )),
    }
}

/// Cell writes for `!set`, skipping cells that already hold the value.
pub fn plan_set(
    data: &ScheduleData,
    args: &[&str],
) -> Result<(WriteTarget, Vec<CellWrite>), String> {
    let week = &data.week;
    let Some((first, rest)) = args.split_first() else {
        return Err("usage: !set [<player>] <day> [<time range>] <values>".to_string());
    };
    if data.last_modified.is_none() {
        return Err(NOT_LOADED.to_string());
    }

    let (target, day, rest, valid, current): (_, _, _, Vec<&str>, Vec<&str>) =
        if let Some(day) = week.day_index(first) {
            (
                WriteTarget::Week,
                day,
                rest,
                data.valid_activities.iter().map(String::as_str).collect(),
                week.activities_on(day),
            )
        } else if let Some(player) = data
            .players
            .iter()
            .find(|player| player.name.eq_ignore_ascii_case(first))
        {
            let day_name = rest.first().copied().unwrap_or_default();
            let day = week
                .day_index(day_name)
                .ok_or_else(|| format!("Invalid day {:?}.", day_name))?;
            (
                WriteTarget::Player(player.name.clone()),
                day,
                &rest[1..],
                RESPONSES.to_vec(),
                player
                    .availability_on(day)
                    .iter()
                    .map(|availability| availability.label())
                    .collect(),
            )
        } else {
            return Err(format!("Invalid day / player {:?}.", first));
        };

    let (blocks, values) = select_blocks(week, rest)?;
    let values = spread(parse_values(values, &valid[..])?, blocks.len())?;

    let writes = blocks
        .zip(values)
        .filter(|(block, value)| current.get(*block).copied() != Some(value.as_str()))
        .map(|(block, value)| cell_write(day, block, CellField::Value, &value))
        .collect();
    Ok((target, writes))
}

/// Note writes for `!set_note`.
pub fn plan_note(week: &Week, args: &[&str]) -> Result<Vec<CellWrite>, String> {
    let Some((first, rest)) = args.split_first() else {
        return Err("usage: !set_note <day> [<time range>] <notes>".to_string());
    };
    let day = week
        .day_index(first)
        .ok_or_else(|| format!("Invalid day {:?}.", first))?;

    let (blocks, values) = select_blocks(week, rest)?;
    let no_validation: [&str; 0] = [];
    let notes = spread(parse_values(values, &no_validation[..])?, blocks.len())?;

    Ok(blocks
        .zip(notes)
        .map(|(block, note)| {
            let note = if CLEAR_WORDS.iter().any(|word| note.eq_ignore_ascii_case(word)) {
                String::new()
            } else {
                note
            };
            (block, note)
        })
        .filter(|(block, note)| week.grid[day].get(*block).map(|cell| &cell.note) != Some(note))
        .map(|(block, note)| cell_write(day, block, CellField::Note, &note))
        .collect())
}

/// Writes that turn `current` back into `default`, block by block.
pub fn plan_reset(current: &Week, default: &Week) -> Vec<CellWrite> {
    let mut writes = Vec::new();

    for (day, (row, saved_row)) in current.grid.iter().zip(&default.grid).enumerate() {
        for (block, (cell, saved)) in row.iter().zip(saved_row).enumerate() {
            if saved.value != cell.value {
                writes.push(cell_write(day, block, CellField::Value, &saved.value));
            }
        }
    }

    writes
}

pub async fn set(bot: &BotState, at: &Invocation, args: &[&str]) -> Result<Reply, CommandError> {
    let (_, schedule) = bot.team_schedule(at.guild()?, at.channel_id).await?;

    let planned = plan_set(&*schedule.read().await, args);
    let (target, writes) = match planned {
        Ok(planned) => planned,
        Err(message) => return Ok(Reply::Text(message)),
    };
    if writes.is_empty() {
        return Ok(Reply::text("Nothing to change."));
    }

    bot.write_schedule(&schedule, &target, &writes).await?;
    Ok(Reply::text("Updated schedule."))
}

pub async fn set_note(bot: &BotState, at: &Invocation, args: &[&str]) -> Result<Reply, CommandError> {
    let (_, schedule) = bot.team_schedule(at.guild()?, at.channel_id).await?;

    let planned = {
        let data = schedule.read().await;
        if data.last_modified.is_none() {
            return Ok(Reply::text(NOT_LOADED));
        }
        plan_note(&data.week, args)
    };
    let writes = match planned {
        Ok(writes) => writes,
        Err(message) => return Ok(Reply::Text(message)),
    };
    if writes.is_empty() {
        return Ok(Reply::text("Nothing to change."));
    }

    bot.write_schedule(&schedule, &WriteTarget::Week, &writes).await?;
    Ok(Reply::text("Updated notes."))
}

pub async fn save(bot: &BotState, at: &Invocation) -> Result<Reply, CommandError> {
    let (_, schedule) = bot.team_schedule(at.guild()?, at.channel_id).await?;

    let week = {
        let data = schedule.read().await;
        if data.last_modified.is_none() {
            return Ok(Reply::text("The schedule is not loaded yet; nothing to save."));
        }
        data.week.clone()
    };

    bot.storage().await.save_default_week(schedule.id(), &week)?;
    Ok(Reply::text("Updated default week schedule. :)"))
}

pub async fn reset(bot: &BotState, at: &Invocation) -> Result<Reply, CommandError> {
    let (_, schedule) = bot.team_schedule(at.guild()?, at.channel_id).await?;

    let Some(default) = bot.storage().await.default_week(schedule.id())? else {
        return Ok(Reply::text("No default week schedule for this sheet."));
    };

    let writes = {
        let data = schedule.read().await;
        if data.last_modified.is_none() {
            return Ok(Reply::text(NOT_LOADED));
        }
        plan_reset(&data.week, &default)
    };
    if writes.is_empty() {
        return Ok(Reply::text("Nothing to change."));
    }

    bot.write_schedule(&schedule, &WriteTarget::Week, &writes).await?;
    Ok(Reply::text("Loaded default week schedule. :)"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::discord::commands::tests::{text, HERE};
    use crate::schedule::Schedule;
    use crate::sheets::fake::{timestamp, FakeSource};
    use crate::state::tests::bot;

    use super::*;

    async fn loaded() -> ScheduleData {
        let schedule = Schedule::new("doc", Arc::new(FakeSource::new(timestamp(12, 0))));
        schedule.update().await.unwrap();
        let data = schedule.read().await.clone();
        data
    }

    fn cells(writes: &[CellWrite]) -> Vec<(usize, usize, &str)> {
        writes
            .iter()
            .map(|write| (write.row, write.column, write.text.as_str()))
            .collect()
    }

    #[tokio::test]
    async fn ranges_select_blocks() {
        let week = loaded().await.week;

        assert_eq!(select_blocks(&week, &["4-8", "x"]).unwrap(), (0..2, &["x"][..]));
        assert_eq!(select_blocks(&week, &["6", "x"]).unwrap(), (1..2, &["x"][..]));
        assert_eq!(select_blocks(&week, &["scrim"]).unwrap(), (0..3, &["scrim"][..]));
        assert_eq!(select_blocks(&week, &[]).unwrap().0, 0..3);

        assert!(select_blocks(&week, &["2-4", "x"]).is_err());
        assert!(select_blocks(&week, &["6-6", "x"]).is_err());
        assert!(select_blocks(&week, &["5-7", "x"]).is_err());
        assert!(select_blocks(&week, &["4-12", "x"]).is_err());
        assert!(select_blocks(&week, &["7", "x"]).is_err());
    }

    #[test]
    fn values_are_validated_and_spread() {
        let valid = ["Free", "Scrim"];

        assert_eq!(
            parse_values(&["scrim,", "FREE"], &valid[..]).unwrap(),
            vec!["Scrim", "Free"]
        );
        assert!(parse_values(&["scrim", "free"], &valid[..]).is_err());
        assert!(parse_values(&[], &valid[..]).is_err());

        assert_eq!(spread(vec!["Free".to_string()], 3).unwrap().len(), 3);
        assert!(spread(vec!["a".to_string(), "b".to_string()], 3).is_err());
    }

    #[tokio::test]
    async fn set_week_blocks() {
        let data = loaded().await;

        let (target, writes) = plan_set(&data, &["monday", "4-8", "scrim,", "scrim"]).unwrap();

        assert_eq!(target, WriteTarget::Week);
        /* Block 1 already holds a scrim. */
        assert_eq!(cells(&writes), vec![(2, 2, "Scrim")]);
    }

    #[tokio::test]
    async fn set_player_availability() {
        let data = loaded().await;

        let (target, writes) = plan_set(&data, &["ana", "sun", "maybe"]).unwrap();

        assert_eq!(target, WriteTarget::Player("Ana".to_string()));
        assert_eq!(
            cells(&writes),
            vec![(8, 2, "Maybe"), (8, 4, "Maybe")]
        );
        assert!(writes.iter().all(|write| write.field == CellField::Value));
    }

    #[tokio::test]
    async fn set_rejects_bad_input() {
        let data = loaded().await;

        assert_eq!(
            plan_set(&data, &["nobody", "monday", "yes"]).unwrap_err(),
            "Invalid day / player \"nobody\"."
        );
        assert_eq!(
            plan_set(&data, &["ana", "someday", "yes"]).unwrap_err(),
            "Invalid day \"someday\"."
        );
        assert_eq!(
            plan_set(&data, &["monday", "4-6", "nap"]).unwrap_err(),
            "Invalid value \"nap\"."
        );
        assert!(plan_set(&data, &["monday", "4-8", "free, free, free"]).is_err());
    }

    #[tokio::test]
    async fn notes_can_be_set_and_cleared() {
        let week = loaded().await.week;

        let writes = plan_note(&week, &["tuesday", "4-8", "Inked"]).unwrap();
        assert_eq!(cells(&writes), vec![(3, 2, "Inked")]);
        assert!(writes.iter().all(|write| write.field == CellField::Note));

        let writes = plan_note(&week, &["tuesday", "6", "none"]).unwrap();
        assert_eq!(cells(&writes), vec![(3, 3, "")]);
    }

    #[tokio::test]
    async fn reset_writes_only_differences() {
        let default = loaded().await.week;
        let mut current = default.clone();
        current.grid[5][2].value = "Scrim".to_string();
        current.grid[5][2].note = "Inked".to_string();

        assert_eq!(cells(&plan_reset(&current, &default)), vec![(7, 4, "Free")]);
        assert!(plan_reset(&default, &default).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn save_then_reset_restores_the_week() {
        let folder = tempfile::tempdir().unwrap();
        let (bot, source, _shutdown) = bot(&folder);
        let (_, loaded) = bot.set_sheet(100, 11, "doc", None).await.unwrap();
        let schedule = loaded.unwrap();

        assert_eq!(
            text(reset(&bot, &HERE).await.unwrap()),
            "No default week schedule for this sheet."
        );
        assert_eq!(
            text(save(&bot, &HERE).await.unwrap()),
            "Updated default week schedule. :)"
        );

        assert_eq!(
            text(set(&bot, &HERE, &["wed", "8", "scrim"]).await.unwrap()),
            "Updated schedule."
        );
        assert_eq!(schedule.read().await.week.grid[2][2].value, "Scrim");
        assert_eq!(
            text(set(&bot, &HERE, &["wed", "8", "scrim"]).await.unwrap()),
            "Nothing to change."
        );

        assert_eq!(
            text(reset(&bot, &HERE).await.unwrap()),
            "Loaded default week schedule. :)"
        );
        assert_eq!(schedule.read().await.week.grid[2][2].value, "Free");
        assert_eq!(source.writes.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn set_note_writes_through() {
        let folder = tempfile::tempdir().unwrap();
        let (bot, _, _shutdown) = bot(&folder);
        let (_, loaded) = bot.set_sheet(100, 11, "doc", None).await.unwrap();
        let schedule = loaded.unwrap();

        assert_eq!(
            text(set_note(&bot, &HERE, &["monday", "6", "vs", "Inked"]).await.unwrap()),
            "Updated notes."
        );
        assert_eq!(schedule.read().await.week.grid[0][1].note, "vs Inked");
        assert_eq!(
            text(set_note(&bot, &HERE, &["funday", "6", "x"]).await.unwrap()),
            "Invalid day \"funday\"."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn edits_wait_for_the_first_load() {
        let folder = tempfile::tempdir().unwrap();
        let (bot, source, _shutdown) = bot(&folder);
        source.fail_last_modified(true);
        let (_, loaded) = bot.set_sheet(100, 11, "doc", None).await.unwrap();
        assert!(loaded.is_err());

        assert_eq!(
            text(set_note(&bot, &HERE, &["monday", "6", "x"]).await.unwrap()),
            NOT_LOADED
        );
        assert_eq!(
            text(set(&bot, &HERE, &["monday", "6", "scrim"]).await.unwrap()),
            NOT_LOADED
        );
        assert!(source.writes.lock().unwrap().is_empty());
    }

    #[test]
    fn unloaded_weeks_plan_nothing() {
        let unloaded = Week::default();

        assert!(plan_note(&unloaded, &["monday", "6", "x"]).is_err());
        assert!(select_blocks(&unloaded, &["4-6", "x"]).is_err());
        assert!(plan_reset(&unloaded, &unloaded).is_empty());
    }
}
