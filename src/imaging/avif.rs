//! AVIF source images.
//!
//! The `image` crate's `avif` feature only encodes. Reading goes through
//! `avif-parse` for the container and `rav1d` for the AV1 payload, then a
//! BT.601 YUV to RGB8 conversion.

use super::backend::{BackendError, Dimensions};
use image::{DynamicImage, RgbImage};
use rav1d::include::dav1d::data::Dav1dData;
use rav1d::include::dav1d::dav1d::Dav1dSettings;
use rav1d::include::dav1d::headers::{
    DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
    DAV1D_PIXEL_LAYOUT_I444,
};
use rav1d::include::dav1d::picture::Dav1dPicture;
use rav1d::src::lib::{
    dav1d_close, dav1d_data_create, dav1d_data_unref, dav1d_default_settings, dav1d_get_picture,
    dav1d_open, dav1d_picture_unref, dav1d_send_data,
};
use std::mem::{self, MaybeUninit};
use std::path::Path;
use std::ptr::{self, NonNull};

pub(super) fn is_avif(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("avif"))
}

fn failed(message: String) -> BackendError {
    BackendError::ProcessingFailed(message)
}

fn read_container(path: &Path) -> Result<avif_parse::AvifData, BackendError> {
    let bytes = std::fs::read(path).map_err(BackendError::Io)?;
    avif_parse::read_avif(&mut std::io::Cursor::new(&bytes))
        .map_err(|e| failed(format!("Failed to parse AVIF {}: {e:?}", path.display())))
}

/// Dimensions from the container metadata, without decoding.
pub(super) fn identify(path: &Path) -> Result<Dimensions, BackendError> {
    let avif = read_container(path)?;
    let meta = avif.primary_item_metadata().map_err(|e| {
        failed(format!("Failed to read AVIF metadata {}: {e:?}", path.display()))
    })?;
    Ok(Dimensions {
        width: meta.max_frame_width.get(),
        height: meta.max_frame_height.get(),
    })
}

/// Decode the primary item to RGB8.
pub(super) fn decode(path: &Path) -> Result<DynamicImage, BackendError> {
    let avif = read_container(path)?;
    let av1: &[u8] = &avif.primary_item;

    let mut settings = MaybeUninit::<Dav1dSettings>::uninit();
    unsafe { dav1d_default_settings(NonNull::from(&mut settings).cast()) };
    let mut settings = unsafe { settings.assume_init() };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc = unsafe { dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(failed(format!("rav1d open failed ({})", rc.0)));
    }

    let decoded = (|| -> Result<DynamicImage, BackendError> {
        let mut data = Dav1dData::default();
        let buf = unsafe { dav1d_data_create(NonNull::new(&mut data), av1.len()) };
        if buf.is_null() {
            return Err(failed("rav1d data_create failed".into()));
        }
        unsafe { ptr::copy_nonoverlapping(av1.as_ptr(), buf, av1.len()) };

        let rc = unsafe { dav1d_send_data(ctx, NonNull::new(&mut data)) };
        if rc.0 != 0 {
            unsafe { dav1d_data_unref(NonNull::new(&mut data)) };
            return Err(failed(format!("rav1d send_data failed ({})", rc.0)));
        }

        let mut picture: Dav1dPicture = unsafe { mem::zeroed() };
        let rc = unsafe { dav1d_get_picture(ctx, NonNull::new(&mut picture)) };
        if rc.0 != 0 {
            return Err(failed(format!("rav1d get_picture failed ({})", rc.0)));
        }
        let image = picture_to_rgb(&picture);
        unsafe { dav1d_picture_unref(NonNull::new(&mut picture)) };
        image
    })();

    unsafe { dav1d_close(NonNull::new(&mut ctx)) };
    decoded
}

/// One decoded plane: base pointer and row stride in bytes.
#[derive(Clone, Copy)]
struct Plane {
    ptr: *const u8,
    stride: isize,
}

impl Plane {
    /// Sample at `(x, y)`. Depths above 8 bits are stored as `u16`.
    fn sample(&self, x: u32, y: u32, bpc: u32) -> f32 {
        let row = y as isize * self.stride;
        if bpc <= 8 {
            (unsafe { *self.ptr.offset(row + x as isize) }) as f32
        } else {
            (unsafe { *(self.ptr.offset(row + x as isize * 2) as *const u16) }) as f32
        }
    }
}

fn picture_to_rgb(picture: &Dav1dPicture) -> Result<DynamicImage, BackendError> {
    let width = picture.p.w as u32;
    let height = picture.p.h as u32;
    let bpc = picture.p.bpc as u32;
    let layout = picture.p.layout;

    let plane = |index: usize, stride: isize| -> Result<Plane, BackendError> {
        picture.data[index]
            .map(|p| Plane {
                ptr: p.as_ptr() as *const u8,
                stride,
            })
            .ok_or_else(|| failed(format!("Decoded AVIF is missing plane {index}")))
    };
    let luma = plane(0, picture.stride[0])?;

    // (cb, cr, horizontal subsampling, vertical subsampling)
    let chroma = match layout {
        DAV1D_PIXEL_LAYOUT_I400 => None,
        DAV1D_PIXEL_LAYOUT_I420 => Some((true, true)),
        DAV1D_PIXEL_LAYOUT_I422 => Some((true, false)),
        DAV1D_PIXEL_LAYOUT_I444 => Some((false, false)),
        _ => return Err(failed(format!("Unsupported AVIF pixel layout: {layout}"))),
    }
    .map(|(ss_x, ss_y)| -> Result<_, BackendError> {
        Ok((
            plane(1, picture.stride[1])?,
            plane(2, picture.stride[1])?,
            ss_x,
            ss_y,
        ))
    })
    .transpose()?;

    let max = ((1u32 << bpc) - 1) as f32;
    let center = (1u32 << (bpc - 1)) as f32;
    let scale = 255.0 / max;
    let to_u8 = |v: f32| (v * scale).clamp(0.0, 255.0) as u8;

    let image = RgbImage::from_fn(width, height, |x, y| {
        let luma = luma.sample(x, y, bpc);
        let Some((cb, cr, ss_x, ss_y)) = chroma else {
            let v = to_u8(luma);
            return image::Rgb([v, v, v]);
        };
        let cx = if ss_x { x / 2 } else { x };
        let cy = if ss_y { y / 2 } else { y };
        let cb = cb.sample(cx, cy, bpc) - center;
        let cr = cr.sample(cx, cy, bpc) - center;
        image::Rgb([
            to_u8(luma + 1.402 * cr),
            to_u8(luma - 0.344136 * cb - 0.714136 * cr),
            to_u8(luma + 1.772 * cb),
        ])
    });
    Ok(DynamicImage::ImageRgb8(image))
}
