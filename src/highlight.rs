use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, Rgb, RgbImage};
use line_drawing::Bresenham;

use crate::vision::{FaceAnnotation, Vertex};

pub const LINE_COLOR: Rgb<u8> = Rgb([0x00, 0xff, 0x00]);
pub const LINE_WIDTH: u32 = 5;

/// 沿每张人脸的 `fdBoundingPoly` 画一个闭合多边形
pub fn highlight_faces(image: &DynamicImage, faces: &[FaceAnnotation]) -> RgbImage {
    let mut canvas = image.to_rgb8();
    for face in faces {
        draw_polygon(&mut canvas, &face.fd_bounding_poly.vertices, LINE_COLOR, LINE_WIDTH);
    }
    canvas
}

/// 画闭合多边形，超出图片范围的部分被裁掉
pub fn draw_polygon(canvas: &mut RgbImage, vertices: &[Vertex], color: Rgb<u8>, width: u32) {
    let Some(first) = vertices.first() else {
        return;
    };
    let points = vertices.iter().chain([first]).map(|v| (v.x, v.y)).collect::<Vec<_>>();

    // 坐标来自外部 JSON，先把每条边裁剪到画布附近再逐点绘制
    let margin = f64::from(width);
    let bounds = Bounds {
        min: -margin,
        max_x: f64::from(canvas.width()) + margin,
        max_y: f64::from(canvas.height()) + margin,
    };

    points
        .windows(2)
        .filter_map(|pair| clip_segment(pair[0], pair[1], &bounds))
        .flat_map(|(start, end)| Bresenham::new(start, end))
        .for_each(|(x, y)| stamp(canvas, x, y, color, width));
}

struct Bounds {
    min: f64,
    max_x: f64,
    max_y: f64,
}

/// Liang-Barsky 裁剪，线段完全在范围外时返回 `None`
fn clip_segment(
    start: (i32, i32),
    end: (i32, i32),
    bounds: &Bounds,
) -> Option<((i32, i32), (i32, i32))> {
    let (x0, y0) = (f64::from(start.0), f64::from(start.1));
    let (dx, dy) = (f64::from(end.0) - x0, f64::from(end.1) - y0);

    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (p, q) in [
        (-dx, x0 - bounds.min),
        (dx, bounds.max_x - x0),
        (-dy, y0 - bounds.min),
        (dy, bounds.max_y - y0),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }

    let at = |t: f64| ((x0 + t * dx).round() as i32, (y0 + t * dy).round() as i32);
    Some((at(t0), at(t1)))
}

fn stamp(canvas: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>, width: u32) {
    let radius = i64::from(width / 2);
    let (x, y) = (i64::from(x), i64::from(y));
    let (w, h) = (i64::from(canvas.width()), i64::from(canvas.height()));
    for py in (y - radius).max(0)..=(y + radius).min(h - 1) {
        for px in (x - radius).max(0)..=(x + radius).min(w - 1) {
            canvas.put_pixel(px as u32, py as u32, color);
        }
    }
}

/// 读取图片，画出人脸后保存，格式由输出文件后缀决定
pub fn highlight_file(input: &Path, faces: &[FaceAnnotation], output: &Path) -> Result<()> {
    let image =
        image::open(input).with_context(|| format!("failed to open image {}", input.display()))?;
    highlight_faces(&image, faces)
        .save(output)
        .with_context(|| format!("failed to save image {}", output.display()))?;
    Ok(())
}
