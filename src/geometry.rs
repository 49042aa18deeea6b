use crate::error::{Error, Result};

/// Convert absolute box bounds into center-form coordinates relative to the
/// image size.
///
/// Requires `0 <= xmin < xmax <= w`, `0 <= ymin < ymax <= h` and a positive
/// image size. Every returned value lies in `(0, 1]`.
pub fn normalize_box(
    xmin: f64,
    xmax: f64,
    ymin: f64,
    ymax: f64,
    w: u32,
    h: u32,
) -> Result<(f64, f64, f64, f64)> {
    if w == 0 || h == 0 {
        return Err(Error::InvalidGeometry(format!(
            "non-positive image size {}x{}",
            w, h
        )));
    }
    let (w, h) = (w as f64, h as f64);
    let finite = [xmin, xmax, ymin, ymax].iter().all(|v| v.is_finite());
    if !finite || !(0.0 <= xmin && xmin < xmax && xmax <= w) {
        return Err(Error::InvalidGeometry(format!(
            "x range [{}, {}] outside [0, {}]",
            xmin, xmax, w
        )));
    }
    if !(0.0 <= ymin && ymin < ymax && ymax <= h) {
        return Err(Error::InvalidGeometry(format!(
            "y range [{}, {}] outside [0, {}]",
            ymin, ymax, h
        )));
    }

    let x_center = (xmin + xmax) / (2.0 * w);
    let y_center = (ymin + ymax) / (2.0 * h);
    let width = (xmax - xmin) / w;
    let height = (ymax - ymin) / h;

    Ok((x_center, y_center, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_reference_box() {
        let (xc, yc, bw, bh) = normalize_box(10.0, 50.0, 20.0, 40.0, 200, 100).unwrap();
        assert!((xc - 0.15).abs() < EPS);
        assert!((yc - 0.3).abs() < EPS);
        assert!((bw - 0.2).abs() < EPS);
        assert!((bh - 0.2).abs() < EPS);
    }

    #[test]
    fn test_outputs_in_unit_range_and_invertible() {
        let sizes = [(1u32, 1u32), (200, 200), (640, 480), (37, 1013)];
        for &(w, h) in &sizes {
            for step in 0..7u32 {
                let xmin = (w as f64) * step as f64 / 8.0;
                let xmax = (w as f64) * (step + 1) as f64 / 8.0;
                let ymin = (h as f64) * (7 - step) as f64 / 8.0;
                let ymax = h as f64;
                let (xc, yc, bw, bh) = normalize_box(xmin, xmax, ymin, ymax, w, h).unwrap();
                for v in [xc, yc, bw, bh] {
                    assert!(v > 0.0 && v <= 1.0, "{} out of range", v);
                }

                // inverse transform
                let (wf, hf) = (w as f64, h as f64);
                assert!(((xc - bw / 2.0) * wf - xmin).abs() < 1e-6);
                assert!(((xc + bw / 2.0) * wf - xmax).abs() < 1e-6);
                assert!(((yc - bh / 2.0) * hf - ymin).abs() < 1e-6);
                assert!(((yc + bh / 2.0) * hf - ymax).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_full_image_box() {
        let out = normalize_box(0.0, 200.0, 0.0, 100.0, 200, 100).unwrap();
        assert_eq!(out, (0.5, 0.5, 1.0, 1.0));
    }

    #[test]
    fn test_rejects_inverted_and_degenerate() {
        assert!(matches!(
            normalize_box(50.0, 10.0, 0.0, 10.0, 100, 100),
            Err(Error::InvalidGeometry(_))
        ));
        assert!(matches!(
            normalize_box(10.0, 10.0, 0.0, 10.0, 100, 100),
            Err(Error::InvalidGeometry(_))
        ));
        assert!(matches!(
            normalize_box(0.0, 10.0, 30.0, 30.0, 100, 100),
            Err(Error::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_bounds() {
        assert!(normalize_box(0.0, 101.0, 0.0, 10.0, 100, 100).is_err());
        assert!(normalize_box(0.0, 10.0, 0.0, 101.0, 100, 100).is_err());
        assert!(normalize_box(-1.0, 10.0, 0.0, 10.0, 100, 100).is_err());
        assert!(normalize_box(0.0, f64::NAN, 0.0, 10.0, 100, 100).is_err());
    }

    #[test]
    fn test_rejects_zero_size() {
        assert!(normalize_box(0.0, 1.0, 0.0, 1.0, 0, 100).is_err());
        assert!(normalize_box(0.0, 1.0, 0.0, 1.0, 100, 0).is_err());
    }
}
