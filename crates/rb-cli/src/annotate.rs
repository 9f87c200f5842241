use std::collections::HashMap;
use std::io::{self, Write};

use colored::Colorize;
use rb_annotations::{format_coordinates, AnnotationStore, NormalizedRect};
use rb_core::core::{regions_for_item, DatasetItem, ImageDimensions, ImageId};

use crate::config::AppConfig;
use crate::dimensions::probe_dimensions;
use crate::files::DatasetDir;

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Next,
    Previous,
    Goto(usize),
    SetBox {
        region: usize,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    },
    DeleteBox(usize),
    Clear,
    ToggleSkip,
    Undo,
    Redo,
    Save,
    Help,
    Quit,
    Unknown,
}

/// Interactive annotation session over a dataset directory.
pub fn run(dir: &DatasetDir, config: &AppConfig) -> Result<(), anyhow::Error> {
    dir.validate()?;
    let items = dir.read_dataset()?;
    if items.is_empty() {
        anyhow::bail!("dataset contains no items");
    }

    let mut store = AnnotationStore::new();
    if let Some(saved) = dir.load_annotations()? {
        store.load_annotations(saved);
    }
    let dimensions = probe_dimensions(dir, &items);

    println!(
        "{}",
        format!("Loaded {} items from {}", items.len(), dir.root().display()).bold()
    );
    print_help();

    let mut current = 0usize;
    let mut show_item = true;
    loop {
        if show_item {
            print_item(&items[current], current, items.len(), &store, &dimensions);
        }
        show_item = true;

        // EOF quits like `q`.
        let Some(line) = prompt_line("> ")? else {
            println!();
            break;
        };

        match parse_command(&line) {
            Command::Next => {
                if current + 1 < items.len() {
                    autosave(dir, &mut store, config)?;
                    current += 1;
                } else {
                    println!("{}", "Already at the last item.".yellow());
                }
            }
            Command::Previous => {
                if current > 0 {
                    autosave(dir, &mut store, config)?;
                    current -= 1;
                } else {
                    println!("{}", "Already at the first item.".yellow());
                }
            }
            Command::Goto(number) => {
                if (1..=items.len()).contains(&number) {
                    autosave(dir, &mut store, config)?;
                    current = number - 1;
                } else {
                    println!(
                        "{}",
                        format!("Item number must be between 1 and {}.", items.len()).yellow()
                    );
                }
            }
            Command::SetBox {
                region,
                x1,
                y1,
                x2,
                y2,
            } => {
                set_box(&items[current], region, (x1, y1, x2, y2), &mut store, &dimensions);
            }
            Command::DeleteBox(region) => {
                delete_box(&items[current], region, &mut store);
            }
            Command::Clear => {
                store.clear_boxes(&items[current].id);
                println!("Cleared all boxes for this item (history reset).");
            }
            Command::ToggleSkip => {
                let image_id = &items[current].id;
                if store.annotation(image_id).is_some_and(|a| a.skipped) {
                    store.unmark_skipped(image_id);
                    println!("Item unskipped.");
                } else {
                    store.mark_skipped(image_id);
                    println!("Item skipped; it will be left out of exports.");
                }
            }
            Command::Undo => {
                if !store.undo() {
                    println!("{}", "Nothing to undo.".yellow());
                }
            }
            Command::Redo => {
                if !store.redo() {
                    println!("{}", "Nothing to redo.".yellow());
                }
            }
            Command::Save => save(dir, &mut store)?,
            Command::Help => {
                print_help();
                show_item = false;
            }
            Command::Quit => break,
            Command::Unknown => {
                println!("{}", "Unrecognized command; h for help.".yellow());
                show_item = false;
            }
        }
    }

    save(dir, &mut store)
}

fn parse_command(input: &str) -> Command {
    let tokens: Vec<&str> = input.split_whitespace().collect();
    match tokens.as_slice() {
        [] => Command::Next,
        ["n"] => Command::Next,
        ["p"] => Command::Previous,
        ["c"] => Command::Clear,
        ["s"] => Command::ToggleSkip,
        ["u"] => Command::Undo,
        ["r"] => Command::Redo,
        ["q"] => Command::Quit,
        ["h"] | ["?"] => Command::Help,
        ["save"] => Command::Save,
        ["g", number] => number.parse().map(Command::Goto).unwrap_or(Command::Unknown),
        ["d", number] => number
            .parse()
            .map(Command::DeleteBox)
            .unwrap_or(Command::Unknown),
        [region, x1, y1, x2, y2] => match (
            region.parse(),
            x1.parse(),
            y1.parse(),
            x2.parse(),
            y2.parse(),
        ) {
            (Ok(region), Ok(x1), Ok(y1), Ok(x2), Ok(y2)) => Command::SetBox {
                region,
                x1,
                y1,
                x2,
                y2,
            },
            _ => Command::Unknown,
        },
        _ => Command::Unknown,
    }
}

fn set_box(
    item: &DatasetItem,
    region_number: usize,
    (x1, y1, x2, y2): (f64, f64, f64, f64),
    store: &mut AnnotationStore,
    dimensions: &HashMap<ImageId, ImageDimensions>,
) {
    let regions = regions_for_item(item);
    let Some(region) = regions.iter().find(|r| r.index == region_number) else {
        println!(
            "{}",
            format!("No region {region_number} on this item.").yellow()
        );
        return;
    };
    let Some(dims) = dimensions.get(&item.id) else {
        println!(
            "{}",
            "Image dimensions unknown; cannot normalize pixel coordinates.".red()
        );
        return;
    };

    let width = f64::from(dims.width);
    let height = f64::from(dims.height);
    let rect = NormalizedRect {
        x: x1.min(x2) / width,
        y: y1.min(y2) / height,
        width: (x2 - x1).abs() / width,
        height: (y2 - y1).abs() / height,
    };

    let bbox = store.add_box(&item.id, &region.id, rect);
    println!(
        "{} {} -> {}",
        "Boxed".green(),
        region.text,
        format_coordinates(&bbox, *dims)
    );
}

fn delete_box(item: &DatasetItem, region_number: usize, store: &mut AnnotationStore) {
    let regions = regions_for_item(item);
    let Some(region) = regions.iter().find(|r| r.index == region_number) else {
        println!(
            "{}",
            format!("No region {region_number} on this item.").yellow()
        );
        return;
    };
    if store.box_for_region(&item.id, &region.id).is_none() {
        println!(
            "{}",
            format!("Region {region_number} has no box.").yellow()
        );
        return;
    }

    store.delete_box_by_region(&item.id, &region.id);
    println!("Deleted box for {}", region.text);
}

fn print_item(
    item: &DatasetItem,
    index: usize,
    total: usize,
    store: &AnnotationStore,
    dimensions: &HashMap<ImageId, ImageDimensions>,
) {
    let dims = dimensions.get(&item.id);
    let skipped = store.annotation(&item.id).is_some_and(|a| a.skipped);

    let mut header = format!("[{}/{}] {} ({})", index + 1, total, item.id, item.image);
    match dims {
        Some(d) => header.push_str(&format!(" {}x{}", d.width, d.height)),
        None => header.push_str(" ?x?"),
    }
    if skipped {
        header.push_str(" [SKIPPED]");
    }
    println!();
    println!("{}", header.bold());

    let regions = regions_for_item(item);
    if regions.is_empty() {
        println!("  (no regions in this item)");
        return;
    }
    for region in &regions {
        match store.box_for_region(&item.id, &region.id) {
            Some(bbox) => {
                let coords = dims
                    .map(|d| format_coordinates(bbox, *d))
                    .unwrap_or_else(|| "?".to_owned());
                println!(
                    "  {} {}. {} ({coords})",
                    "[x]".green(),
                    region.index,
                    region.text
                );
            }
            None => {
                println!("  {} {}. {}", "[ ]".dimmed(), region.index, region.text);
            }
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  <region> <x1> <y1> <x2> <y2>   box a region in pixel coordinates");
    println!("  d <region>                     delete a region's box");
    println!("  c                              clear all boxes for this item");
    println!("  s                              toggle skip for this item");
    println!("  u / r                          undo / redo");
    println!("  n / Enter, p, g <item>         next, previous, go to item");
    println!("  save                           save annotations now");
    println!("  q                              quit (saves if needed)");
}

fn save(dir: &DatasetDir, store: &mut AnnotationStore) -> Result<(), anyhow::Error> {
    if !store.is_dirty() {
        return Ok(());
    }
    dir.save_annotations(store.annotations().clone())?;
    store.mark_clean();
    println!(
        "{}",
        format!("Saved {}", dir.annotations_path().display()).green()
    );
    Ok(())
}

fn autosave(
    dir: &DatasetDir,
    store: &mut AnnotationStore,
    config: &AppConfig,
) -> Result<(), anyhow::Error> {
    if config.autosave.enabled {
        save(dir, store)
    } else {
        Ok(())
    }
}

fn prompt_line(prompt: &str) -> io::Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush()?;

    let mut input = String::new();
    match io::stdin().read_line(&mut input) {
        Ok(0) => Ok(None),
        Ok(_) => Ok(Some(input.trim().to_owned())),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_advances() {
        assert_eq!(parse_command(""), Command::Next);
        assert_eq!(parse_command("   "), Command::Next);
    }

    #[test]
    fn test_parse_single_letter_commands() {
        assert_eq!(parse_command("n"), Command::Next);
        assert_eq!(parse_command("p"), Command::Previous);
        assert_eq!(parse_command("c"), Command::Clear);
        assert_eq!(parse_command("s"), Command::ToggleSkip);
        assert_eq!(parse_command("u"), Command::Undo);
        assert_eq!(parse_command("r"), Command::Redo);
        assert_eq!(parse_command("q"), Command::Quit);
        assert_eq!(parse_command("h"), Command::Help);
        assert_eq!(parse_command("save"), Command::Save);
    }

    #[test]
    fn test_parse_goto_and_delete() {
        assert_eq!(parse_command("g 12"), Command::Goto(12));
        assert_eq!(parse_command("d 2"), Command::DeleteBox(2));
        assert_eq!(parse_command("g twelve"), Command::Unknown);
    }

    #[test]
    fn test_parse_box_coordinates() {
        assert_eq!(
            parse_command("1 10 20 110 220"),
            Command::SetBox {
                region: 1,
                x1: 10.0,
                y1: 20.0,
                x2: 110.0,
                y2: 220.0
            }
        );
        assert_eq!(parse_command("1 10 20 110"), Command::Unknown);
        assert_eq!(parse_command("x 10 20 110 220"), Command::Unknown);
    }
}
