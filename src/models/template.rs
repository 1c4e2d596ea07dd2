use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{WORLD_HEIGHT, WORLD_WIDTH};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoundingBox {
    #[serde(rename = "minX")]
    pub min_x: u32,
    #[serde(rename = "minY")]
    pub min_y: u32,
    #[serde(rename = "maxX")]
    pub max_x: u32,
    #[serde(rename = "maxY")]
    pub max_y: u32,
}

impl BoundingBox {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    pub fn area(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.min_x > self.max_x || self.min_y > self.max_y {
            return Err(format!(
                "inverted bounding box ({},{})..({},{})",
                self.min_x, self.min_y, self.max_x, self.max_y
            ));
        }
        if self.max_x >= WORLD_WIDTH {
            return Err(format!(
                "maxX {} exceeds the canvas width of {} columns",
                self.max_x, WORLD_WIDTH
            ));
        }
        if self.max_y >= WORLD_HEIGHT {
            return Err(format!(
                "maxY {} exceeds the canvas height of {} rows",
                self.max_y, WORLD_HEIGHT
            ));
        }
        Ok(())
    }
}

/// A template entry from `templates.json`. Exactly one of `color` and
/// `image` must be set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Template {
    pub id: u32,
    pub name: String,
    /// Identifier of the template on the remote service, used for subscribing.
    #[serde(rename = "templateId", default)]
    pub remote_id: Option<u64>,
    #[serde(flatten)]
    pub bounds: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColorSource {
    Single(String),
    Image(PathBuf),
}

impl Template {
    pub fn color_source(&self) -> Result<ColorSource, String> {
        match (&self.color, &self.image) {
            (Some(color), None) => Ok(ColorSource::Single(color.clone())),
            (None, Some(image)) => Ok(ColorSource::Image(image.clone())),
            (Some(_), Some(_)) => Err(format!(
                "template {} sets both color and image",
                self.id
            )),
            (None, None) => Err(format!("template {} has no color source", self.id)),
        }
    }
}

/// One addressable canvas cell paired with the color it should end up with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetCell {
    pub x: u32,
    pub y: u32,
    pub cell_id: u32,
    pub desired_color: String,
}
