//! Image rendering for DDNet notifications.
//!
//! This module handles:
//! - Assembling a tee from a 256x128 skin atlas (body, feet, eyes)
//! - Compositing up to two tees with their names over the map preview
//! - Fallbacks for missing map previews, skins and fonts

use ab_glyph::{Font, FontVec, PxScale};
use async_trait::async_trait;
use ddtrack_core::{Artifact, Renderer, ServerPresence};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage, imageops};
use imageproc::drawing::{draw_filled_circle_mut, draw_text_mut};
use std::io::Cursor;
use tracing::{debug, warn};

/// Output size of the notification image.
pub const CANVAS_WIDTH: u32 = 720;
pub const CANVAS_HEIGHT: u32 = 400;

/// Size of one assembled tee on the final image.
const TEE_SIZE: u32 = 180;
/// Space between two tees.
const TEE_SPACING: u32 = 40;
/// Distance between the tees' feet and the bottom edge.
const BOTTOM_MARGIN: u32 = 20;
/// At most this many tees are drawn.
const MAX_TEES: usize = 2;

const NAME_FONT_SIZE: f32 = 32.0;
const MIN_NAME_FONT_SIZE: f32 = 16.0;

/// Reference width of a skin atlas; skins may be any multiple of it.
const SKIN_BASE_WIDTH: f32 = 256.0;

/// Render a tee from a skin atlas.
///
/// The tee is composed of:
/// - Feet: 32x32 at (192, 32) and (224, 32), drawn behind the body
/// - Body: 96x96 at (0, 0)
/// - Eyes: 32x32 at (64, 96) and (96, 96)
///
/// Parts are scaled with nearest-neighbor (pixel art) onto a 300x300 canvas,
/// which is then smoothed down to the final tee size.
pub fn assemble_tee(skin: &RgbaImage) -> RgbaImage {
    let scale = skin.width() as f32 / SKIN_BASE_WIDTH;
    let part = |x: u32, y: u32, w: u32, h: u32, size: u32| {
        let region = imageops::crop_imm(
            skin,
            (x as f32 * scale) as u32,
            (y as f32 * scale) as u32,
            ((w as f32 * scale) as u32).max(1),
            ((h as f32 * scale) as u32).max(1),
        )
        .to_image();
        if region.width() == 0 || region.height() == 0 {
            return RgbaImage::new(size, size);
        }
        imageops::resize(&region, size, size, imageops::FilterType::Nearest)
    };

    let canvas_size = 300u32;
    let body_size = 128u32;
    let foot_size = 42u32;
    let eye_size = 42u32;

    let body = part(0, 0, 96, 96, body_size);
    let foot_left = part(192, 32, 32, 32, foot_size);
    let foot_right = part(224, 32, 32, 32, foot_size);
    let eye_left = part(64, 96, 32, 32, eye_size);
    let eye_right = part(96, 96, 32, 32, eye_size);

    let mut canvas = RgbaImage::from_pixel(canvas_size, canvas_size, Rgba([0, 0, 0, 0]));
    let body_x = (canvas_size / 2 - body_size / 2) as i64;
    let body_y = (canvas_size / 2 - body_size / 2) as i64;
    let body_size = body_size as i64;
    let foot_size = foot_size as i64;

    // Feet go behind the body, attached high on its sides
    let feet_y = body_y + body_size * 60 / 100;
    let feet_offset = body_size * 18 / 100;
    imageops::overlay(
        &mut canvas,
        &foot_left,
        body_x + body_size * 20 / 100 - feet_offset,
        feet_y,
    );
    imageops::overlay(
        &mut canvas,
        &foot_right,
        body_x + body_size * 80 / 100 - foot_size + feet_offset,
        feet_y,
    );

    imageops::overlay(&mut canvas, &body, body_x, body_y);

    let eye_y = body_y + body_size * 38 / 100;
    imageops::overlay(&mut canvas, &eye_left, body_x + body_size * 22 / 100, eye_y);
    imageops::overlay(&mut canvas, &eye_right, body_x + body_size * 55 / 100, eye_y);

    imageops::resize(&canvas, TEE_SIZE, TEE_SIZE, imageops::FilterType::Lanczos3)
}

/// Stand-in skin atlas: a plain brown body and nothing else.
pub fn fallback_skin() -> RgbaImage {
    let mut skin = RgbaImage::from_pixel(256, 128, Rgba([0, 0, 0, 0]));
    draw_filled_circle_mut(&mut skin, (48, 48), 44, Rgba([200, 150, 100, 255]));
    skin
}

/// Dark background used when the map preview cannot be fetched.
fn placeholder_map(font: Option<&FontVec>) -> RgbaImage {
    let mut map = RgbaImage::from_pixel(CANVAS_WIDTH, CANVAS_HEIGHT, Rgba([40, 40, 50, 255]));
    if let Some(font) = font {
        let scale = PxScale::from(52.0);
        let text = "Unknown map";
        let width = measure_text_width(font, text, scale);
        draw_text_mut(
            &mut map,
            Rgba([220, 220, 220, 255]),
            (CANVAS_WIDTH.saturating_sub(width) / 2) as i32,
            40,
            scale,
            font,
            text,
        );
    }
    map
}

/// A tee to draw, with the name shown above it.
pub struct TeeEntry<'a> {
    pub name: &'a str,
    pub skin: RgbaImage,
}

/// Composite tees over the map preview and encode the result as PNG.
///
/// Layout:
/// - One tee is centered horizontally
/// - Two tees stand side by side, centered as a pair
/// - Tees stand on the bottom edge, names are drawn above their heads
pub fn render_composite(
    map: Option<RgbaImage>,
    tees: &[TeeEntry<'_>],
    font: Option<&FontVec>,
) -> Result<Vec<u8>, RenderError> {
    let mut canvas = match map {
        Some(map) => imageops::resize(
            &map,
            CANVAS_WIDTH,
            CANVAS_HEIGHT,
            imageops::FilterType::Lanczos3,
        ),
        None => placeholder_map(font),
    };

    let tees = &tees[..tees.len().min(MAX_TEES)];
    let row_width =
        TEE_SIZE * tees.len() as u32 + TEE_SPACING * (tees.len() as u32).saturating_sub(1);
    let start_x = CANVAS_WIDTH.saturating_sub(row_width) / 2;
    let tee_y = CANVAS_HEIGHT - TEE_SIZE - BOTTOM_MARGIN;

    for (i, entry) in tees.iter().enumerate() {
        let tee = assemble_tee(&entry.skin);
        let tee_x = start_x + i as u32 * (TEE_SIZE + TEE_SPACING);
        imageops::overlay(&mut canvas, &tee, tee_x.into(), tee_y.into());

        if let Some(font) = font {
            draw_name(&mut canvas, font, entry.name, tee_x + TEE_SIZE / 2, tee_y);
        }
    }

    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| RenderError::ImageEncode(e.to_string()))?;

    Ok(buf)
}

/// Draw a white name with a black outline, centered on `center_x`, ending just above `bottom`.
fn draw_name(canvas: &mut RgbaImage, font: &FontVec, name: &str, center_x: u32, bottom: u32) {
    let font_size = calculate_font_size(font, name);
    let scale = PxScale::from(font_size);
    let width = measure_text_width(font, name, scale);
    let x = center_x as i32 - width as i32 / 2;
    let y = bottom as i32 - font_size as i32 - 8;

    let outline = 2;
    for dx in -outline..=outline {
        for dy in -outline..=outline {
            if dx != 0 || dy != 0 {
                draw_text_mut(canvas, Rgba([0, 0, 0, 255]), x + dx, y + dy, scale, font, name);
            }
        }
    }
    draw_text_mut(canvas, Rgba([255, 255, 255, 255]), x, y, scale, font, name);
}

/// Calculate font size for a name, scaling down so it fits over the tee.
fn calculate_font_size(font: &impl Font, name: &str) -> f32 {
    let max_width = (TEE_SIZE + TEE_SPACING) as f32;
    let width = measure_text_width(font, name, PxScale::from(NAME_FONT_SIZE)) as f32;
    if width <= max_width {
        NAME_FONT_SIZE
    } else {
        (NAME_FONT_SIZE * max_width / width).max(MIN_NAME_FONT_SIZE)
    }
}

/// Measure the width of text in pixels.
fn measure_text_width(font: &impl Font, text: &str, scale: PxScale) -> u32 {
    let mut width = 0.0f32;
    let scale_factor = scale.x / font.height_unscaled();
    for c in text.chars() {
        let glyph_id = font.glyph_id(c);
        let advance = font.h_advance_unscaled(glyph_id);
        width += advance * scale_factor;
    }
    width as u32
}

/// Renders notification images, fetching map previews and skins from ddnet.org.
pub struct TeeRenderer {
    http: reqwest::Client,
    base_url: reqwest::Url,
    font: Option<FontVec>,
}

impl TeeRenderer {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        font_path: Option<&str>,
    ) -> Result<Self, RenderError> {
        let base_url =
            reqwest::Url::parse(base_url).map_err(|e| RenderError::InvalidUrl(e.to_string()))?;
        let font = match font_path {
            Some(path) => match load_font(path) {
                Ok(font) => Some(font),
                Err(err) => {
                    warn!(path, %err, "player names will not be drawn");
                    None
                }
            },
            None => None,
        };
        Ok(Self {
            http,
            base_url,
            font,
        })
    }

    /// `<base>/ranks/maps/<map>.png`, spaces replaced by underscores.
    pub fn map_url(&self, map: &str) -> Option<reqwest::Url> {
        let file = format!("{}.png", map.replace(' ', "_"));
        self.url_for(&["ranks", "maps", &file])
    }

    /// Candidate skin locations in lookup order.
    pub fn skin_urls(&self, skin: &str) -> Vec<reqwest::Url> {
        let file = format!("{}.png", skin);
        [
            self.url_for(&["skins", "skin", &file]),
            self.url_for(&["skins", "skin", "community", &file]),
            self.url_for(&["skins", "skin", "default.png"]),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn url_for(&self, segments: &[&str]) -> Option<reqwest::Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut().ok()?.pop_if_empty().extend(segments);
        Some(url)
    }

    async fn fetch_image(&self, url: reqwest::Url) -> Option<RgbaImage> {
        let resp = match self.http.get(url.clone()).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                debug!(%url, status = resp.status().as_u16(), "image not available");
                return None;
            }
            Err(err) => {
                debug!(%url, %err, "image request failed");
                return None;
            }
        };
        let bytes = resp.bytes().await.ok()?;
        match image::load_from_memory(&bytes) {
            Ok(img) => Some(img.to_rgba8()),
            Err(err) => {
                debug!(%url, %err, "image could not be decoded");
                None
            }
        }
    }

    async fn fetch_skin(&self, skin: &str) -> Option<RgbaImage> {
        for url in self.skin_urls(skin) {
            if let Some(img) = self.fetch_image(url).await {
                return Some(img);
            }
        }
        None
    }
}

#[async_trait]
impl Renderer for TeeRenderer {
    async fn render(&self, presence: &ServerPresence) -> Artifact {
        let mut degraded = self.font.is_none();

        let map = match self.map_url(&presence.meta.map) {
            Some(url) => self.fetch_image(url).await,
            None => None,
        };
        degraded |= map.is_none();

        let mut tees = Vec::new();
        for participant in presence.participants.iter().take(MAX_TEES) {
            let skin = match self.fetch_skin(&participant.skin).await {
                Some(skin) => skin,
                None => {
                    degraded = true;
                    fallback_skin()
                }
            };
            tees.push(TeeEntry {
                name: participant.name.as_str(),
                skin,
            });
        }

        match render_composite(map, &tees, self.font.as_ref()) {
            Ok(bytes) => Artifact { bytes, degraded },
            Err(err) => {
                warn!(key = %presence.key, %err, "failed to render notification image");
                Artifact {
                    bytes: Vec::new(),
                    degraded: true,
                }
            }
        }
    }
}

fn load_font(path: &str) -> Result<FontVec, RenderError> {
    let data = std::fs::read(path).map_err(|e| RenderError::FontLoad(e.to_string()))?;
    FontVec::try_from_vec(data).map_err(|e| RenderError::FontLoad(e.to_string()))
}

/// Errors that can occur during rendering.
#[derive(Debug)]
pub enum RenderError {
    /// Failed to encode image
    ImageEncode(String),
    /// Failed to load font
    FontLoad(String),
    /// Base URL for assets is not a valid URL
    InvalidUrl(String),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::ImageEncode(e) => write!(f, "failed to encode image: {}", e),
            RenderError::FontLoad(e) => write!(f, "failed to load font: {}", e),
            RenderError::InvalidUrl(e) => write!(f, "invalid asset base url: {}", e),
        }
    }
}

impl std::error::Error for RenderError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> TeeRenderer {
        TeeRenderer::new(reqwest::Client::new(), "https://ddnet.org", None).unwrap()
    }

    #[test]
    fn test_assemble_fallback_tee() {
        let tee = assemble_tee(&fallback_skin());
        assert_eq!(tee.dimensions(), (TEE_SIZE, TEE_SIZE));
        // the body is drawn in the middle
        assert!(tee.get_pixel(TEE_SIZE / 2, TEE_SIZE / 2)[3] > 0);
    }

    #[test]
    fn test_assemble_tee_from_hd_skin() {
        let skin = RgbaImage::from_pixel(512, 256, Rgba([10, 200, 10, 255]));
        let tee = assemble_tee(&skin);
        assert_eq!(tee.dimensions(), (TEE_SIZE, TEE_SIZE));
    }

    #[test]
    fn test_render_without_map_or_font() {
        let tees = [TeeEntry {
            name: "nameless tee",
            skin: fallback_skin(),
        }];
        let png = render_composite(None, &tees, None).unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!((img.width(), img.height()), (CANVAS_WIDTH, CANVAS_HEIGHT));
    }

    #[test]
    fn test_render_caps_tees() {
        let tees: Vec<TeeEntry<'_>> = ["a", "b", "c"]
            .into_iter()
            .map(|name| TeeEntry {
                name,
                skin: fallback_skin(),
            })
            .collect();
        let map = RgbaImage::from_pixel(360, 200, Rgba([90, 120, 200, 255]));
        assert!(render_composite(Some(map), &tees, None).is_ok());
    }

    #[test]
    fn test_render_empty_tee_list() {
        assert!(render_composite(None, &[], None).is_ok());
    }

    #[test]
    fn test_map_url_escapes_name() {
        let url = renderer().map_url("Just Another Map?").unwrap();
        assert_eq!(
            url.as_str(),
            "https://ddnet.org/ranks/maps/Just_Another_Map%3F.png"
        );
    }

    #[test]
    fn test_skin_urls_lookup_order() {
        let urls: Vec<String> = renderer()
            .skin_urls("santa_limekitty")
            .into_iter()
            .map(|u| u.to_string())
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://ddnet.org/skins/skin/santa_limekitty.png",
                "https://ddnet.org/skins/skin/community/santa_limekitty.png",
                "https://ddnet.org/skins/skin/default.png",
            ]
        );
    }

    #[test]
    fn test_missing_font_file_is_tolerated() {
        let renderer = TeeRenderer::new(
            reqwest::Client::new(),
            "https://ddnet.org",
            Some("/nonexistent/font.ttf"),
        )
        .unwrap();
        assert!(renderer.font.is_none());
    }
}
