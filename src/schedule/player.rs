use serde::{Deserialize, Serialize};

use crate::sheets::SheetGrid;

use super::{FIRST_BLOCK_COLUMN, FIRST_DAY_ROW};

/* Rows of the roster sheet that may name a player. */
const ROSTER_ROWS: std::ops::Range<usize> = 3..15;
const ROLE_COLUMN: usize = 1;
const NAME_COLUMN: usize = 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum Availability {
    Yes,
    Maybe,
    No,
    #[default]
    Blank,
}

impl Availability {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "yes" => Availability::Yes,
            "maybe" => Availability::Maybe,
            "no" => Availability::No,
            _ => Availability::Blank,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Availability::Yes => "Yes",
            Availability::Maybe => "Maybe",
            Availability::No => "No",
            Availability::Blank => "",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Player {
    pub sheet_id: i64,
    pub name: String,
    pub role: String,
    pub availability: [Vec<Availability>; 7],
}

impl Player {
    pub fn parse(sheet: &SheetGrid, role: &str, blocks: usize) -> Self {
        let availability = std::array::from_fn(|day| {
            (0..blocks)
                .map(|block| {
                    Availability::parse(sheet.value(FIRST_DAY_ROW + day, FIRST_BLOCK_COLUMN + block))
                })
                .collect()
        });

        Player {
            sheet_id: sheet.id,
            name: sheet.title.clone(),
            role: role.to_string(),
            availability,
        }
    }

    pub fn availability_on(&self, day: usize) -> &[Availability] {
        &self.availability[day]
    }

    pub fn availability_at(&self, day: usize, block: usize) -> Availability {
        self.availability[day]
            .get(block)
            .copied()
            .unwrap_or_default()
    }
}

/// Player names with their role, in roster order.
///
/// A role heading applies to its own row and every row below it until the
/// next heading.
pub fn roster(sheet: &SheetGrid) -> Vec<(String, String)> {
    let mut players = Vec::new();
    let mut current_role = "";

    for row in ROSTER_ROWS {
        let role = sheet.value(row, ROLE_COLUMN);
        if !role.is_empty() {
            current_role = role;
        }

        let name = sheet.value(row, NAME_COLUMN);
        if !name.is_empty() {
            players.push((name.to_string(), current_role.to_string()));
        }
    }

    players
}
