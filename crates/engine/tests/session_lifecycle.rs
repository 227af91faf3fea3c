//! Session lifecycle integration tests.

use cellar_core::{Error, TypedArray};
use cellar_engine::Sessions;
use tempfile::tempdir;

#[test]
fn data_written_in_one_session_is_readable_in_a_later_one() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.db");
    let sessions = Sessions::new();

    let id = sessions.open(&path, None).unwrap();
    sessions
        .get(id)
        .unwrap()
        .put(b"greeting", &TypedArray::text("hello"))
        .unwrap();
    sessions.close(id).unwrap();

    let id = sessions.open(&path, None).unwrap();
    let db = sessions.get(id).unwrap();
    assert_eq!(
        db.get(b"greeting").unwrap().unwrap().as_text(),
        Some("hello".to_string())
    );
    sessions.close(id).unwrap();
}

#[test]
fn default_session_tracks_open_close_interleaving() {
    let dir = tempdir().unwrap();
    let sessions = Sessions::new();

    let a = sessions.open(dir.path().join("a.db"), None).unwrap();
    let b = sessions.open(dir.path().join("b.db"), None).unwrap();

    // Work through the default (b), then make a the default explicitly
    sessions
        .resolve(None)
        .unwrap()
        .put(b"k", &TypedArray::scalar_i64(2))
        .unwrap();
    sessions.set_default(a).unwrap();
    sessions
        .resolve(None)
        .unwrap()
        .put(b"k", &TypedArray::scalar_i64(1))
        .unwrap();

    assert_eq!(
        sessions.get(a).unwrap().get(b"k").unwrap().unwrap().as_i64s(),
        Some(vec![1])
    );
    assert_eq!(
        sessions.get(b).unwrap().get(b"k").unwrap().unwrap().as_i64s(),
        Some(vec![2])
    );

    // Closing the explicit default falls back to the highest remaining id
    sessions.close(a).unwrap();
    assert_eq!(sessions.default_id().unwrap(), b);

    sessions.close(b).unwrap();
    assert!(matches!(
        sessions.default_id(),
        Err(Error::NoDefaultSession)
    ));
}

#[test]
fn operations_through_shared_handles_are_visible_everywhere() {
    let dir = tempdir().unwrap();
    let sessions = Sessions::new();
    let id = sessions.open(dir.path().join("store.db"), None).unwrap();

    let handle1 = sessions.get(id).unwrap();
    let handle2 = sessions.get(id).unwrap();

    handle1.put(b"k", &TypedArray::scalar_bool(true)).unwrap();
    assert!(handle2.exists(b"k").unwrap());
    handle2.delete(b"k").unwrap();
    assert_eq!(handle1.get(b"k").unwrap(), None);

    sessions.close(id).unwrap();
}
