use crate::error::PipelineError;
use image::Rgb32FImage;
use ndarray::Array4;

/// Spatial resolution expected by the classifier.
pub const INPUT_SIZE: u32 = 224;
pub const CHANNELS: usize = 3;

/// Decodes raw image bytes into the classifier's input tensor.
///
/// Returns a channel-last tensor of shape [1, 224, 224, 3] holding pixel
/// intensities in the 0..=255 range. Alpha is dropped and single-channel
/// images are replicated across RGB.
pub fn process_bytes(buffer: &[u8]) -> Result<Array4<f32>, PipelineError> {
    // 1. Decode (format guessed from the content, not the declared MIME type)
    let img = image::load_from_memory(buffer)?;
    tracing::debug!(
        width = img.width(),
        height = img.height(),
        color = ?img.color(),
        "decoded image"
    );

    // 2. Force three channels. Done in f32 so the resize below is not quantized.
    let rgb = img.to_rgb32f();

    // 3. Bilinear resize, back in the 0..=255 range, [H, W, C] + batch axis
    let side = INPUT_SIZE as usize;
    let data = resize_bilinear(&rgb, side, side);
    let array = Array4::from_shape_vec((1, side, side, CHANNELS), data)?;

    Ok(array)
}

/// Source sample for one output coordinate: lower index, upper index and
/// the weight of the upper one.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Tap {
    lo: usize,
    hi: usize,
    frac: f32,
}

/// Sampling grid without corner alignment or half-pixel offset: output `i`
/// reads input `i * in_len / out_len`, clamped at the last source index.
fn taps(in_len: usize, out_len: usize) -> Vec<Tap> {
    let scale = in_len as f32 / out_len as f32;
    (0..out_len)
        .map(|i| {
            let src = i as f32 * scale;
            let lo = (src.floor() as usize).min(in_len - 1);
            let hi = (lo + 1).min(in_len - 1);
            Tap {
                lo,
                hi,
                frac: src - lo as f32,
            }
        })
        .collect()
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Resizes an f32 RGB image into a row-major HWC buffer scaled to 0..=255.
fn resize_bilinear(img: &Rgb32FImage, out_h: usize, out_w: usize) -> Vec<f32> {
    let (in_w, in_h) = (img.width() as usize, img.height() as usize);
    let raw = img.as_raw();
    let px = |y: usize, x: usize, c: usize| raw[(y * in_w + x) * CHANNELS + c];

    let rows = taps(in_h, out_h);
    let cols = taps(in_w, out_w);

    let mut out = Vec::with_capacity(out_h * out_w * CHANNELS);
    for row in &rows {
        for col in &cols {
            for c in 0..CHANNELS {
                let top = lerp(px(row.lo, col.lo, c), px(row.lo, col.hi, c), col.frac);
                let bottom = lerp(px(row.hi, col.lo, c), px(row.hi, col.hi, c), col.frac);
                out.push(lerp(top, bottom, row.frac) * 255.0);
            }
        }
    }
    out
}
