// rust/arc-data-core/src/render.rs

//! Rendering of a task as a color image.
//!
//! Pairs are laid out left to right, train pairs first, with inputs on the
//! top row and outputs on the bottom row. Each cell is a square of
//! `cell_size` pixels and cells are separated by grid lines.

use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgb, RgbImage};
use tracing::info;

use crate::error::{DataError, Result};
use crate::task::{Grid, Pair, Task, PALETTE_SIZE};

/// RGB values of the palette, indexed by color.
pub const PALETTE: [[u8; 3]; PALETTE_SIZE as usize] = [
    [0x00, 0x00, 0x00], // black
    [0x00, 0x74, 0xD9], // blue
    [0xFF, 0x41, 0x36], // red
    [0x2E, 0xCC, 0x40], // green
    [0xFF, 0xDC, 0x00], // yellow
    [0xAA, 0xAA, 0xAA], // grey
    [0xF0, 0x12, 0xBE], // fuchsia
    [0xFF, 0x85, 0x1B], // orange
    [0x7F, 0xDB, 0xFF], // teal
    [0x87, 0x0C, 0x25], // brown
    [0xFF, 0xC0, 0xCB], // pink, outer boundary
    [0xFF, 0xFF, 0xFF], // white, empty
];

/// Drawing parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Used for the default file name when saving into a directory.
    pub title: String,
    pub cell_size: u32,
    pub grid_line_width: u32,
    pub grid_line_color: Rgb<u8>,
    /// Gap around and between panels.
    pub padding: u32,
    pub background: Rgb<u8>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            title: "ARC task".to_string(),
            cell_size: 16,
            grid_line_width: 1,
            grid_line_color: Rgb([0xFF, 0xFF, 0xFF]),
            padding: 8,
            background: Rgb([0x30, 0x30, 0x30]),
        }
    }
}

/// Parses `#RRGGBB`, `RRGGBB`, or one of `white`/`w`, `black`/`k`, `grey`.
///
/// # Errors
///
/// Returns a `Config` error for anything else.
pub fn parse_color(text: &str) -> Result<Rgb<u8>> {
    match text.trim().to_lowercase().as_str() {
        "w" | "white" => return Ok(Rgb([0xFF, 0xFF, 0xFF])),
        "k" | "black" => return Ok(Rgb([0x00, 0x00, 0x00])),
        "grey" | "gray" => return Ok(Rgb(PALETTE[5])),
        _ => {}
    }

    let hex = text.trim().trim_start_matches('#');
    let invalid = || DataError::config(format!("invalid color '{text}'"));
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(invalid());
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

/// Renders `task` into an RGB image.
///
/// Test pairs without an output are drawn with a 2x2 placeholder of color 0;
/// the task itself is left untouched.
///
/// # Errors
///
/// Returns a `Render` error if either pair list is empty, a grid is empty or
/// ragged, a color is outside the palette, or the image would be too large.
pub fn render_task(task: &Task, options: &RenderOptions) -> Result<RgbImage> {
    if task.train.is_empty() {
        return Err(DataError::render("task has no train pairs"));
    }
    if task.test.is_empty() {
        return Err(DataError::render("task has no test pairs"));
    }
    if options.cell_size == 0 {
        return Err(DataError::render("cell_size must be greater than 0"));
    }

    let placeholder = Grid::filled(2, 2, 0);
    let columns: Vec<(&Grid, &Grid)> = task
        .pairs()
        .map(|pair: &Pair| (&pair.input, pair.output.as_ref().unwrap_or(&placeholder)))
        .collect();

    let labels = task
        .train
        .iter()
        .enumerate()
        .map(|(i, _)| format!("train {i}"))
        .chain(task.test.iter().enumerate().map(|(i, _)| format!("test {i}")));
    for ((input, output), label) in columns.iter().zip(labels) {
        check_grid(input, &label, "input")?;
        check_grid(output, &label, "output")?;
    }

    let mut panels = Vec::with_capacity(columns.len());
    let mut top = 0;
    let mut bottom = 0;
    for (input, output) in &columns {
        let input_size = panel_size(input, options)?;
        let output_size = panel_size(output, options)?;
        top = top.max(input_size.1);
        bottom = bottom.max(output_size.1);
        panels.push((input_size, output_size));
    }

    let pad = u64::from(options.padding);
    let width = panels
        .iter()
        .map(|(i, o)| u64::from(i.0.max(o.0)) + pad)
        .sum::<u64>()
        + pad;
    let height = u64::from(top) + u64::from(bottom) + 3 * pad;
    let (width, height) = match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => return Err(DataError::render(format!("image of {width}x{height} is too large"))),
    };

    let mut image = RgbImage::from_pixel(width, height, options.background);
    let mut x = options.padding;
    for ((input, output), (input_size, output_size)) in columns.iter().zip(&panels) {
        draw_grid(&mut image, input, (x, options.padding), *input_size, options);
        draw_grid(&mut image, output, (x, 2 * options.padding + top), *output_size, options);
        x += input_size.0.max(output_size.0) + options.padding;
    }
    Ok(image)
}

/// Renders `task` and writes it as PNG.
///
/// If `path` is an existing directory the file is named after the title.
/// Parent directories are created. Returns the written path.
///
/// # Errors
///
/// Returns a `Render` error if rendering or encoding fails, or a `Storage`
/// error if the parent directory cannot be created.
pub fn save_task(task: &Task, options: &RenderOptions, path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let target = if path.is_dir() {
        path.join(format!("{}.png", file_stem(&options.title)))
    } else {
        path.to_path_buf()
    };

    let image = render_task(task, options)?;
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            DataError::storage_with_source(parent, "failed to create output directory", e)
        })?;
    }
    image
        .save_with_format(&target, ImageFormat::Png)
        .map_err(|e| DataError::render(format!("failed to write '{}': {e}", target.display())))?;

    info!(
        "Rendered '{}' ({}x{}) to {}",
        options.title,
        image.width(),
        image.height(),
        target.display()
    );
    Ok(target)
}

fn check_grid(grid: &Grid, label: &str, side: &str) -> Result<()> {
    if grid.is_empty() || grid.width() == 0 {
        return Err(DataError::render(format!("{label} {side} grid is empty")));
    }
    if !grid.is_rectangular() {
        return Err(DataError::render(format!("{label} {side} grid is not rectangular")));
    }
    for (r, row) in grid.rows().iter().enumerate() {
        if let Some((c, color)) = row.iter().enumerate().find(|(_, v)| **v >= PALETTE_SIZE) {
            return Err(DataError::render(format!(
                "{label} {side} has color {color} at ({r}, {c}), outside the palette"
            )));
        }
    }
    Ok(())
}

/// Pixel extent of a grid: cells plus a line on every edge.
fn panel_size(grid: &Grid, options: &RenderOptions) -> Result<(u32, u32)> {
    let extent = |cells: usize| -> Result<u32> {
        let cells = u64::try_from(cells).unwrap_or(u64::MAX);
        let lines = cells.saturating_add(1);
        let pixels = cells
            .saturating_mul(u64::from(options.cell_size))
            .saturating_add(lines.saturating_mul(u64::from(options.grid_line_width)));
        u32::try_from(pixels)
            .map_err(|_| DataError::render(format!("grid of {cells} cells is too large to draw")))
    };
    Ok((extent(grid.width())?, extent(grid.height())?))
}

fn draw_grid(
    image: &mut RgbImage,
    grid: &Grid,
    (left, top): (u32, u32),
    (width, height): (u32, u32),
    options: &RenderOptions,
) {
    for y in top..top + height {
        for x in left..left + width {
            image.put_pixel(x, y, options.grid_line_color);
        }
    }

    let step = options.cell_size + options.grid_line_width;
    for (r, row) in grid.rows().iter().enumerate() {
        for (c, color) in row.iter().enumerate() {
            let fill = Rgb(PALETTE[usize::from(*color)]);
            let x0 = left + options.grid_line_width + c as u32 * step;
            let y0 = top + options.grid_line_width + r as u32 * step;
            for y in y0..y0 + options.cell_size {
                for x in x0..x0 + options.cell_size {
                    image.put_pixel(x, y, fill);
                }
            }
        }
    }
}

fn file_stem(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "task".to_string()
    } else {
        stem
    }
}
