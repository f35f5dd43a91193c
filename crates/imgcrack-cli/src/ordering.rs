use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, ContentArrangement, Table};

use crate::console::file_label;
use crate::prompt::PromptDriver;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PositionError {
    NotANumber,
    OutOfRange,
    Taken(usize),
}

impl PositionError {
    fn message(&self, count: usize) -> String {
        match self {
            Self::NotANumber => "Please enter a number.".to_string(),
            Self::OutOfRange => format!("Invalid position (1-{count})."),
            Self::Taken(position) => format!("Position {position} already taken."),
        }
    }
}

fn parse_position(
    raw: &str,
    default: usize,
    slots: &[Option<PathBuf>],
) -> Result<usize, PositionError> {
    let raw = raw.trim();
    let position = if raw.is_empty() {
        default
    } else {
        raw.parse::<usize>().map_err(|_| PositionError::NotANumber)?
    };

    if !(1..=slots.len()).contains(&position) {
        return Err(PositionError::OutOfRange);
    }
    if slots[position - 1].is_some() {
        return Err(PositionError::Taken(position));
    }
    Ok(position)
}

/// Assigns every target a unique 1-based position, shows the result and
/// starts over until the operator confirms it.
pub fn choose_target_order(
    targets: &[PathBuf],
    prompt: &mut dyn PromptDriver,
) -> Result<Vec<PathBuf>> {
    let count = targets.len();

    loop {
        let mut slots: Vec<Option<PathBuf>> = vec![None; count];

        for (index, target) in targets.iter().enumerate() {
            let default = index + 1;
            loop {
                let raw = prompt.input(&format!(
                    "Position for {} (1-{count}) [Enter for {default}]:",
                    file_label(target)
                ))?;
                match parse_position(&raw, default, &slots) {
                    Ok(position) => {
                        slots[position - 1] = Some(target.clone());
                        break;
                    }
                    Err(error) => eprintln!("{}", error.message(count)),
                }
            }
        }

        let ordered = slots.into_iter().flatten().collect::<Vec<_>>();
        println!("{}", order_table("Order", &ordered));
        if prompt.confirm("Use this order?", true)? {
            tracing::info!(?ordered, "manual image order confirmed");
            return Ok(ordered);
        }
    }
}

pub fn order_table(label: &str, targets: &[PathBuf]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![label, "Disk image"]);
    for (index, target) in targets.iter().enumerate() {
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(target.display()),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use crate::prompt::{ScriptedPromptDriver, ScriptedPromptResponse};

    use super::*;

    fn targets() -> Vec<PathBuf> {
        ["a.dmg", "b.dmg", "c.dmg"]
            .iter()
            .map(PathBuf::from)
            .collect()
    }

    fn input(value: &str) -> ScriptedPromptResponse {
        ScriptedPromptResponse::Input(value.to_string())
    }

    #[test]
    fn positions_reorder_targets() {
        let mut prompt = ScriptedPromptDriver::new(vec![
            input("3"),
            input("1"),
            input("2"),
            ScriptedPromptResponse::Confirm(true),
        ]);

        let ordered = choose_target_order(&targets(), &mut prompt).expect("order");

        assert_eq!(
            ordered,
            vec![
                PathBuf::from("b.dmg"),
                PathBuf::from("c.dmg"),
                PathBuf::from("a.dmg")
            ]
        );
    }

    #[test]
    fn empty_answers_keep_default_positions() {
        let mut prompt = ScriptedPromptDriver::new(vec![
            input(""),
            input(""),
            input(""),
            ScriptedPromptResponse::Confirm(true),
        ]);

        assert_eq!(
            choose_target_order(&targets(), &mut prompt).expect("order"),
            targets()
        );
    }

    #[test]
    fn invalid_and_taken_positions_are_asked_again() {
        let mut prompt = ScriptedPromptDriver::new(vec![
            input("2"),
            input("x"),
            input("9"),
            input("2"),
            input("3"),
            input(""),
            input("1"),
            ScriptedPromptResponse::Confirm(true),
        ]);

        let ordered = choose_target_order(&targets(), &mut prompt).expect("order");

        assert_eq!(
            ordered,
            vec![
                PathBuf::from("c.dmg"),
                PathBuf::from("a.dmg"),
                PathBuf::from("b.dmg")
            ]
        );
        assert!(prompt.is_exhausted());
    }

    #[test]
    fn declining_the_result_starts_over() {
        let mut prompt = ScriptedPromptDriver::new(vec![
            input("3"),
            input("2"),
            input("1"),
            ScriptedPromptResponse::Confirm(false),
            input(""),
            input(""),
            input(""),
            ScriptedPromptResponse::Confirm(true),
        ]);

        assert_eq!(
            choose_target_order(&targets(), &mut prompt).expect("order"),
            targets()
        );
    }

    #[test]
    fn position_parsing_reports_each_error() {
        let slots = vec![Some(PathBuf::from("a.dmg")), None];

        assert_eq!(parse_position(" 2 ", 1, &slots), Ok(2));
        assert_eq!(parse_position("", 1, &slots), Err(PositionError::Taken(1)));
        assert_eq!(parse_position("0", 1, &slots), Err(PositionError::OutOfRange));
        assert_eq!(parse_position("two", 1, &slots), Err(PositionError::NotANumber));
        assert_eq!(PositionError::OutOfRange.message(2), "Invalid position (1-2).");
    }
}
