use image::RgbaImage;
use rand::seq::SliceRandom;
use rand::Rng;

use super::palette::{parse_hex_color, to_hex, Palette};
use crate::constants::WORLD_WIDTH;
use crate::error::{AppError, AppResult};
use crate::models::{BoundingBox, CellOrder, ColorSource, TargetCell, Template};

pub fn cell_id(x: u32, y: u32) -> u32 {
    y * WORLD_WIDTH + x
}

/// Expands a template into the cells one pass should paint. The result is
/// recomputed for every pass and never shared between accounts.
pub struct TargetSetBuilder<'a> {
    palette: &'a Palette,
    order: CellOrder,
}

impl<'a> TargetSetBuilder<'a> {
    pub fn new(palette: &'a Palette, order: CellOrder) -> Self {
        Self { palette, order }
    }

    pub fn build(&self, template: &Template) -> AppResult<Vec<TargetCell>> {
        self.build_with_rng(template, &mut rand::thread_rng())
    }

    pub fn build_with_rng<R: Rng + ?Sized>(
        &self,
        template: &Template,
        rng: &mut R,
    ) -> AppResult<Vec<TargetCell>> {
        template.bounds.validate().map_err(AppError::Template)?;

        let mut cells = match template.color_source().map_err(AppError::Template)? {
            ColorSource::Single(color) => {
                let rgb = parse_hex_color(&color).ok_or_else(|| {
                    AppError::Template(format!(
                        "template {} has invalid color {}",
                        template.id, color
                    ))
                })?;
                direct_cells(&template.bounds, &to_hex(rgb))
            }
            ColorSource::Image(path) => {
                let image = image::open(&path)?.to_rgba8();
                self.image_cells(&template.bounds, &image)
            }
        };

        self.apply_order(&mut cells, rng);
        Ok(cells)
    }

    /// Leaves row-major order in place or shuffles uniformly.
    pub fn apply_order<R: Rng + ?Sized>(&self, cells: &mut [TargetCell], rng: &mut R) {
        if self.order == CellOrder::Shuffled {
            cells.shuffle(rng);
        }
    }

    /// Aligns `image` to the top-left corner of `bounds`. Pixels outside the
    /// box and fully transparent pixels produce no cell.
    pub fn image_cells(&self, bounds: &BoundingBox, image: &RgbaImage) -> Vec<TargetCell> {
        let width = image.width().min(bounds.width());
        let height = image.height().min(bounds.height());
        let mut cells = Vec::with_capacity(width as usize * height as usize);

        for py in 0..height {
            for px in 0..width {
                let [r, g, b, a] = image.get_pixel(px, py).0;
                if a == 0 {
                    continue;
                }
                let (x, y) = (bounds.min_x + px, bounds.min_y + py);
                cells.push(TargetCell {
                    x,
                    y,
                    cell_id: cell_id(x, y),
                    desired_color: self.palette.nearest([r, g, b]).hex.clone(),
                });
            }
        }
        cells
    }
}

fn direct_cells(bounds: &BoundingBox, color: &str) -> Vec<TargetCell> {
    let mut cells = Vec::with_capacity(bounds.area());
    for y in bounds.min_y..=bounds.max_y {
        for x in bounds.min_x..=bounds.max_x {
            cells.push(TargetCell {
                x,
                y,
                cell_id: cell_id(x, y),
                desired_color: color.to_string(),
            });
        }
    }
    cells
}
