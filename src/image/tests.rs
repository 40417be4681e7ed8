use super::*;
use Color as C;

fn mkimage<const W: usize, const H: usize>(data: [[Color; W]; H]) -> Image {
    let mut image = Image::new(W as u32, H as u32);
    for (y, row) in data.iter().enumerate() {
        for (x, color) in row.iter().enumerate() {
            image.set(x as u32, y as u32, *color);
        }
    }
    image
}

#[test]
fn css_colors_clamp() {
    assert_eq!(
        Color::from_css_rgba(127.5, 127.5, 255.0, 0.5),
        Color::from_rgba8(128, 128, 255, 128)
    );
    assert_eq!(
        Color::from_css_rgba(400.0, -20.0, 255.0, 3.0),
        Color::from_rgba8(255, 0, 255, 255)
    );
}

#[test]
fn blend() {
    let mut image = mkimage([[C::RED]]);
    let overlay = mkimage([[C::GREEN.with_alpha(0)]]);
    image.blend_from(&overlay).mode(BlendMode::Alpha);
    assert_eq!(image.get(0, 0), C::RED);

    let mut image = mkimage([[C::RED]]);
    image.blend_from(&overlay).mode(BlendMode::Overwrite);
    assert_eq!(image.get(0, 0), C::GREEN.with_alpha(0));

    let mut image = mkimage([[C::BLACK]]);
    image.blend_pixel(0, 0, C::WHITE.with_alpha(128));
    assert_eq!(image.get(0, 0), C::from_rgb8(128, 128, 128));
}

#[test]
fn blend_only_overlap() {
    let mut image = mkimage([[C::RED, C::RED]]);
    let overlay = mkimage([[C::BLUE]]);
    image.blend_from(&overlay);
    assert_eq!(image.get(0, 0), C::BLUE);
    assert_eq!(image.get(1, 0), C::RED);
}

#[test]
fn background_is_gray() {
    let mut canvas = Image::new(4, 4);
    let mut frame = Image::new(4, 4);
    frame.clear(C::RED);
    canvas.draw_background(&frame);

    let px = canvas.get(2, 2);
    assert_eq!(px.r(), px.g());
    assert_eq!(px.g(), px.b());
    assert!(px.r() > 0);
}

#[test]
fn from_raw_checks_length() {
    assert!(Image::from_rgba8(2, 2, vec![0; 16]).is_ok());
    assert!(Image::from_rgba8(2, 2, vec![0; 15]).is_err());
}

#[test]
fn shapes_are_clipped() {
    let mut image = Image::new(8, 8);
    draw_circle(&mut image, 0.0, 0.0, 4.0).color(C::RED);
    draw_line(&mut image, -10.0, 4.0, 20.0, 4.0).color(C::BLUE);
    draw_polyline(&mut image, &[(7.0, 0.0), (7.0, 7.0), (100.0, 100.0)]).color(C::GREEN);

    assert_eq!(image.get(0, 0), C::RED);
    assert_eq!(image.get(3, 4), C::BLUE);
    assert_eq!(image.get(7, 1), C::GREEN);

    // Shapes mostly outside of the image must not panic.
    draw_ellipse(&mut image, 4.0, 4.0, 20.0, 2.0);
    draw_text(&mut image, -50.0, 100.0, "clipped").align_top();
}

#[test]
fn single_point_polyline_draws_nothing() {
    let mut image = Image::new(4, 4);
    draw_polyline(&mut image, &[(1.0, 1.0)]).color(C::RED);
    assert!(image.pixels().all(|px| px == C::NULL));
}

#[test]
fn extensions_ignore_case() {
    assert!(is_image_path(Path::new("frames/f0.PNG")));
    assert!(is_image_path(Path::new("f1.Jpeg")));
    assert!(!is_image_path(Path::new("f2.gif")));
    assert!(!is_image_path(Path::new("png")));

    let dir = std::env::temp_dir().join(format!("posevis-image-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("frame.PNG");
    mkimage([[C::RED, C::GREEN]]).save(&path).unwrap();
    let loaded = Image::load(&path).unwrap();
    std::fs::remove_dir_all(&dir).unwrap();
    assert_eq!(loaded.get(1, 0), C::GREEN);

    let err = Image::load(dir.join("frame.gif")).err().unwrap();
    assert!(err.to_string().contains("invalid image path"));
}
