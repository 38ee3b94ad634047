use kurbo::{Point, Size, Vec2};
use meetink_core::config::EngineConfig;
use meetink_core::items::SerializableColor;
use meetink_core::scene::{LayerKind, TextureState};
use meetink_engine::Whiteboard;
use meetink_render::encode_png;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn board() -> Whiteboard {
    Whiteboard::offline(EngineConfig::default(), Size::new(320.0, 240.0))
}

fn solid_png(size: u32, rgba: [u8; 4]) -> Vec<u8> {
    let pixels: Vec<u8> = rgba.iter().copied().cycle().take((size * size * 4) as usize).collect();
    encode_png(&pixels, size, size).unwrap()
}

#[test]
fn test_image_texture_loads_into_frame() {
    init();
    let mut board = board();
    board.place_image(Point::new(100.0, 100.0), "/uploads/red.png", 40, 40);
    board.render();
    assert_eq!(board.take_texture_requests(), vec!["/uploads/red.png".to_string()]);
    assert!(board.take_texture_requests().is_empty());

    // Placeholder until the bytes arrive
    assert_ne!(board.compositor().frame().color_at(100, 100), SerializableColor::new(255, 0, 0, 255));

    let state = board
        .complete_texture_load("/uploads/red.png", Ok(solid_png(40, [255, 0, 0, 255])))
        .unwrap();
    assert_eq!(state, TextureState::Ready);
    assert!(board.render());
    assert_eq!(
        board.compositor().frame().color_at(100, 100),
        SerializableColor::new(255, 0, 0, 255)
    );
}

#[test]
fn test_garbage_bytes_leave_placeholder() {
    init();
    let mut board = board();
    board.place_image(Point::new(100.0, 100.0), "/uploads/bad.png", 40, 40);
    board.render();
    board.take_texture_requests();
    assert!(board
        .complete_texture_load("/uploads/bad.png", Ok(vec![1, 2, 3]))
        .is_err());
    board.render();
    // Failed images keep the gray placeholder
    assert_eq!(
        board.compositor().frame().color_at(90, 100),
        SerializableColor::new(200, 200, 200, 255)
    );
}

#[test]
fn test_load_for_removed_item_is_dropped() {
    init();
    let mut board = board();
    board.place_image(Point::new(100.0, 100.0), "/uploads/gone.png", 40, 40);
    board.render();
    board.take_texture_requests();
    assert!(board.delete_selection());
    board.render();

    let state = board
        .complete_texture_load("/uploads/gone.png", Ok(solid_png(2, [0, 0, 255, 255])))
        .unwrap();
    assert_eq!(state, TextureState::Pending);
    assert!(board.textures().is_empty());
}

#[test]
fn test_pan_moves_content_on_screen() {
    init();
    let mut board = board();
    board.place_sticky_note(Point::new(100.0, 100.0));
    board.cancel();
    board.render();
    let fill = SerializableColor::sticky_yellow();
    assert_eq!(board.compositor().frame().color_at(100, 100), fill);

    board.pan(Vec2::new(150.0, 0.0));
    assert!(board.render());
    assert_eq!(board.compositor().frame().color_at(250, 100), fill);
    assert_eq!(board.compositor().frame().color_at(20, 100), SerializableColor::white());
}

#[test]
fn test_export_png_decodes() {
    init();
    let mut board = board();
    board.place_stamp(Point::new(50.0, 50.0));
    let png = board.export_png().unwrap();
    let decoded = image::load_from_memory(&png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (320, 240));
    assert!(!board.scene().layer(LayerKind::Static).is_empty());
}
