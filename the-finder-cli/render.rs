use std::fmt::Write;

use the_finder::{
  Finder,
  FolderStore,
  ListItem,
  PreviewSource,
};

/// Plain-text dump of every tab and the active tab's columns.
pub fn render<S>(finder: &Finder<S>) -> String
where
  S: FolderStore + PreviewSource,
{
  let mut out = String::new();
  let active = finder.tabs().active_id();
  let labels: Vec<String> = finder
    .labels()
    .into_iter()
    .map(|(id, label)| {
      let marker = if id == active { "*" } else { " " };
      format!("{marker}[{}] {label}", id.get())
    })
    .collect();
  let _ = writeln!(out, "tabs: {}", labels.join("  "));

  let state = finder.state();
  for (depth, column) in state.visible_columns().iter().enumerate() {
    let rows: Vec<String> = column
      .items()
      .iter()
      .enumerate()
      .map(|(index, item)| {
        let cursor = if index == column.focused_index() { ">" } else { " " };
        let suffix = if item.is_folder() { "/" } else { "" };
        format!("{cursor}{}{suffix}", item.title())
      })
      .collect();
    let _ = writeln!(out, "  {depth} {}: {}", column.title(), rows.join(" "));
  }

  if let Some(items) = finder.preview_items() {
    let titles: Vec<&str> = items.iter().map(ListItem::title).collect();
    let _ = writeln!(out, "  preview: {}", titles.join(", "));
  } else if let Some(preview) = state.preview() {
    let _ = writeln!(out, "  preview: {} ({} bytes)", preview.title, preview.body.len());
  }
  let _ = writeln!(out, "  track-x: {}", finder.rendered_track_x());
  out
}
