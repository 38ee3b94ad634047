use std::cell::RefCell;
use std::rc::Rc;

use kurbo::{Point, Size};
use meetink_core::config::EngineConfig;
use meetink_core::input::{Modifiers, PointerButton};
use meetink_core::items::{ImageData, Item, ItemData, ItemKind, Transform};
use meetink_core::sync::{BoardEvent, Envelope, MemoryHub, Transport};
use meetink_core::tools::ToolKind;
use meetink_core::SyncController;
use meetink_engine::Whiteboard;

const VIEWPORT: Size = Size::new(640.0, 480.0);

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn peer(hub: &MemoryHub, room: &str, sender: &str) -> Whiteboard {
    let config = EngineConfig::default();
    let transport = hub.connect(room, sender);
    let sync = SyncController::new(room, sender, Box::new(transport), &config.sync);
    Whiteboard::new(config, VIEWPORT, sync)
}

/// Transport that keeps everything sent and never receives.
#[derive(Clone, Default)]
struct Recorder(Rc<RefCell<Vec<Envelope>>>);

impl Recorder {
    fn events(&self) -> Vec<BoardEvent> {
        self.0.borrow().iter().map(|e| e.event.clone()).collect()
    }

    fn count(&self, name: &str) -> usize {
        self.0.borrow().iter().filter(|e| e.event.name() == name).count()
    }
}

impl Transport for Recorder {
    fn send(&mut self, envelope: &Envelope) -> bool {
        self.0.borrow_mut().push(envelope.clone());
        true
    }

    fn poll(&mut self) -> Vec<Envelope> {
        Vec::new()
    }
}

fn recorded() -> (Whiteboard, Recorder) {
    let config = EngineConfig::default();
    let recorder = Recorder::default();
    let sync = SyncController::new("room", "me", Box::new(recorder.clone()), &config.sync);
    (Whiteboard::new(config, VIEWPORT, sync), recorder)
}

fn press(board: &mut Whiteboard, p: Point, t: f64) {
    board.pointer_down(p, PointerButton::Primary, Modifiers::NONE, t);
}

fn release(board: &mut Whiteboard, p: Point, t: f64) {
    board.pointer_up(p, PointerButton::Primary, Modifiers::NONE, t);
}

#[test]
fn test_stroke_reaches_peer_and_is_box_selectable() {
    init();
    let hub = MemoryHub::new();
    let mut a = peer(&hub, "room", "a");
    let mut b = peer(&hub, "room", "b");
    a.set_tool(ToolKind::Pen);

    let from = Point::new(100.0, 100.0);
    let to = Point::new(350.0, 250.0);
    press(&mut a, from, 0.0);
    let mut t = 0.0;
    for i in 1..=50 {
        t = i as f64 * 16.0;
        a.pointer_move(from.lerp(to, i as f64 / 50.0), Modifiers::NONE, t);
        if i == 20 {
            b.tick(t);
            assert!(!b.sync().live_strokes_of("a").is_empty());
            assert!(b.store().is_empty());
        }
    }
    release(&mut a, to, t + 16.0);
    assert_eq!(a.store().len(), 1);

    b.tick(t + 32.0);
    assert_eq!(b.store().len(), 1);
    assert!(b.sync().live_strokes_of("a").is_empty());
    let item = b.store().iter().next().unwrap().clone();
    assert_eq!(item.kind(), ItemKind::Path);
    let sent = a.store().get(&item.id).unwrap();
    assert_eq!(
        item.as_path().unwrap().points.len(),
        sent.as_path().unwrap().points.len()
    );

    // Marquee over the whole stroke on the receiving side
    press(&mut b, Point::new(20.0, 20.0), 1000.0);
    b.pointer_move(Point::new(500.0, 400.0), Modifiers::NONE, 1016.0);
    release(&mut b, Point::new(500.0, 400.0), 1032.0);
    assert_eq!(b.selection().selected(), &[item.id]);
}

#[test]
fn test_cursor_presence_and_departure() {
    init();
    let hub = MemoryHub::new();
    let mut a = peer(&hub, "room", "a");
    let mut b = peer(&hub, "room", "b");
    a.set_user_name("Ada");

    a.pointer_move(Point::new(40.0, 60.0), Modifiers::NONE, 0.0);
    b.tick(0.0);
    let cursor = b.sync().cursor_of("a").unwrap();
    assert_eq!(cursor.target, Point::new(40.0, 60.0));
    assert_eq!(cursor.name.as_deref(), Some("Ada"));

    // Moves inside the batch interval are coalesced
    a.pointer_move(Point::new(41.0, 60.0), Modifiers::NONE, 10.0);
    a.pointer_move(Point::new(42.0, 60.0), Modifiers::NONE, 20.0);
    b.tick(20.0);
    assert_eq!(b.sync().cursor_of("a").unwrap().target, Point::new(40.0, 60.0));
    a.tick(60.0);
    b.tick(60.0);
    assert_eq!(b.sync().cursor_of("a").unwrap().target, Point::new(42.0, 60.0));

    // A bare connection that shows a cursor and then drops
    let mut carol = hub.connect("room", "c");
    let cursor = BoardEvent::Cursor(meetink_core::sync::CursorUpdate {
        x: 5.0,
        y: 5.0,
        tool: ToolKind::Pen,
        name: None,
        avatar: None,
    });
    assert!(carol.send(&Envelope::new("room", "c", cursor)));
    b.tick(80.0);
    assert!(b.sync().cursor_of("c").is_some());

    carol.disconnect();
    b.tick(100.0);
    assert!(b.sync().cursor_of("c").is_none());
    assert!(b.sync().cursor_of("a").is_some());
}

#[test]
fn test_own_echo_rehydrates_emptied_store() {
    init();
    let hub = MemoryHub::with_echo();
    let mut a = peer(&hub, "room", "a");
    let id = a.place_sticky_note(Point::new(200.0, 200.0));

    // A reconnect wiped the local store before the echo arrived
    a.load_items(Vec::new());
    assert!(a.store().is_empty());
    a.tick(0.0);
    assert!(a.store().contains(&id));
    assert!(!a.state().history.can_undo());
}

#[test]
fn test_undo_redo_converges_peers() {
    init();
    let hub = MemoryHub::new();
    let mut a = peer(&hub, "room", "a");
    let mut b = peer(&hub, "room", "b");

    let id = a.place_stamp(Point::new(100.0, 100.0));
    b.tick(0.0);
    assert!(b.store().contains(&id));

    assert!(a.undo());
    b.tick(16.0);
    assert!(b.store().is_empty());

    assert!(a.redo());
    b.tick(32.0);
    assert_eq!(b.store().get(&id), a.store().get(&id));
}

#[test]
fn test_drag_broadcasts_final_transforms() {
    init();
    let hub = MemoryHub::new();
    let mut a = peer(&hub, "room", "a");
    let mut b = peer(&hub, "room", "b");
    let id = a.place_stamp(Point::new(100.0, 100.0));
    b.tick(0.0);

    press(&mut a, Point::new(100.0, 100.0), 100.0);
    a.pointer_move(Point::new(130.0, 100.0), Modifiers::NONE, 116.0);
    a.pointer_move(Point::new(150.0, 140.0), Modifiers::NONE, 132.0);
    release(&mut a, Point::new(150.0, 140.0), 148.0);

    b.tick(200.0);
    let moved = b.store().get(&id).unwrap();
    assert_eq!(moved.transform, a.store().get(&id).unwrap().transform);
    assert!((moved.transform.x - 118.0).abs() < 1e-9);
}

#[test]
fn test_remote_delete_drops_selection() {
    init();
    let hub = MemoryHub::new();
    let mut a = peer(&hub, "room", "a");
    let mut b = peer(&hub, "room", "b");
    let id = a.place_stamp(Point::new(100.0, 100.0));
    b.tick(0.0);
    press(&mut b, Point::new(100.0, 100.0), 10.0);
    release(&mut b, Point::new(100.0, 100.0), 20.0);
    assert_eq!(b.selection().selected(), &[id]);

    assert!(a.delete_selection());
    b.tick(30.0);
    assert!(b.store().is_empty());
    assert!(b.selection().is_empty());
}

#[test]
fn test_eraser_miss_broadcasts_no_mutation() {
    init();
    let (mut board, recorder) = recorded();
    board.load_items(vec![Item::new(
        ItemData::Image(ImageData::new("/uploads/far.png", 50.0, 50.0)),
        Transform::at(500.0, 400.0),
        1.0,
    )]);
    board.set_tool(ToolKind::Eraser);
    press(&mut board, Point::new(10.0, 10.0), 0.0);
    for i in 1..=10 {
        board.pointer_move(Point::new(10.0 + i as f64 * 10.0, 10.0), Modifiers::NONE, i as f64 * 16.0);
    }
    release(&mut board, Point::new(110.0, 10.0), 200.0);

    assert_eq!(recorder.count("update_item"), 0);
    assert_eq!(recorder.count("delete_item"), 0);
    assert!(recorder.count("draw_batch") >= 1);
    assert_eq!(recorder.count("stroke_end"), 1);
    assert!(!board.state().history.can_undo());
}

#[test]
fn test_eraser_over_image_sends_one_update() {
    init();
    let (mut board, recorder) = recorded();
    let image = Item::new(
        ItemData::Image(ImageData::new("/uploads/photo.png", 200.0, 100.0)),
        Transform::at(100.0, 100.0),
        1.0,
    );
    let id = image.id;
    board.load_items(vec![image]);
    board.set_tool(ToolKind::Eraser);

    press(&mut board, Point::new(80.0, 150.0), 0.0);
    for i in 1..=12 {
        board.pointer_move(Point::new(80.0 + i as f64 * 20.0, 150.0), Modifiers::NONE, i as f64 * 16.0);
    }
    release(&mut board, Point::new(320.0, 150.0), 300.0);

    let updates: Vec<BoardEvent> = recorder
        .events()
        .into_iter()
        .filter(|e| e.name() == "update_item")
        .collect();
    assert_eq!(updates.len(), 1);
    match &updates[0] {
        BoardEvent::UpdateItem(update) => {
            assert_eq!(update.id, id);
            let data = update.changes.data.as_ref().unwrap();
            assert_eq!(data.erasures().len(), 1);
        }
        other => panic!("expected update_item, got {other:?}"),
    }
    assert_eq!(board.store().get(&id).unwrap().data.erasures().len(), 1);
    assert!(board.particles().is_empty());
    assert!(board.state().history.can_undo());
}
