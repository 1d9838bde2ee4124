use super::*;

#[test]
fn room_new_is_empty() {
    let room = Room::new();
    assert!(room.participants.is_empty());
    assert!(room.locks.is_empty());
    assert!(room.senders.is_empty());
}

#[test]
fn room_default_equals_new() {
    let a = Room::new();
    let b = Room::default();
    assert_eq!(a.participants.len(), b.participants.len());
    assert_eq!(a.locks.len(), b.locks.len());
}

#[test]
fn participant_serde_round_trip() {
    let mut p = test_helpers::dummy_participant(7, "Ada");
    p.cursor = Some(CursorPos { x: 0.5, y: 0.25 });
    p.current_slide = Some(3);

    let json = serde_json::to_string(&p).unwrap();
    assert!(json.contains("\"userId\":7"));
    assert!(json.contains("\"userName\":\"Ada\""));

    let restored: Participant = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.user_id, 7);
    assert_eq!(restored.user_name, "Ada");
    assert_eq!(restored.current_slide, Some(3));
    let cursor = restored.cursor.unwrap();
    assert!((cursor.x - 0.5).abs() < f64::EPSILON);
}

#[test]
fn touch_refreshes_activity() {
    let mut p = test_helpers::dummy_participant(1, "Ada");
    let before = p.last_activity_at;
    std::thread::sleep(std::time::Duration::from_millis(5));
    p.touch();
    assert!(p.last_activity_at > before);
}

#[test]
fn palette_colors_are_distinct_hex() {
    let mut seen = std::collections::HashSet::new();
    for color in COLOR_PALETTE {
        assert!(color.starts_with('#') && color.len() == 7, "bad palette entry: {color}");
        assert!(seen.insert(color), "duplicate palette entry: {color}");
    }
}
