use super::{ClientState, NewNick, Nick, Scratch, StateKey};
use std::sync::Arc;

#[derive(Default)]
struct EventLog;

impl StateKey for EventLog {
    type Value = Vec<String>;
}

#[test]
fn typed_keys() {
    let state = ClientState::new();
    assert_eq!(state.nick(), None);
    assert_eq!(state.insert::<Nick>("rbot".into()), None);
    assert_eq!(state.insert::<Nick>("rbot_".into()), Some("rbot".into()));
    assert_eq!(state.nick().as_deref(), Some("rbot_"));
    assert!(state.contains::<Nick>());
    assert_eq!(state.remove::<Nick>(), Some("rbot_".into()));
    assert!(!state.contains::<Nick>());
}

#[test]
fn custom_key() {
    let state = ClientState::new();
    state.with::<EventLog, _>(|log| log.push("joined #ivy".into()));
    state.with::<EventLog, _>(|log| log.push("left #ivy".into()));
    assert_eq!(state.get::<EventLog>().unwrap(), ["joined #ivy", "left #ivy"]);
}

#[test]
fn new_nick_fifo() {
    let state = ClientState::new();
    state.push_new_nick("nick");
    state.push_new_nick("nick_");
    assert_eq!(state.new_nicks(), ["nick", "nick_"]);
    assert_eq!(state.peek_new_nick().as_deref(), Some("nick"));
    assert_eq!(state.pop_new_nick().as_deref(), Some("nick"));
    assert_eq!(state.pop_new_nick().as_deref(), Some("nick_"));
    assert_eq!(state.pop_new_nick(), None);
    assert!(state.get::<NewNick>().unwrap().is_empty());
}

#[test]
fn scratch_accumulates() {
    let state = ClientState::new();
    state.with::<Scratch, _>(|s| s.entry("#a".into()).or_default().push("one".into()));
    state.with::<Scratch, _>(|s| s.entry("#a".into()).or_default().push("two".into()));
    let names = state.with::<Scratch, _>(|s| s.remove("#a")).unwrap();
    assert_eq!(names, ["one", "two"]);
}

#[test]
fn concurrent_pushes() {
    let state = Arc::new(ClientState::new());
    let threads: Vec<_> = (0..4)
        .map(|n| {
            let state = state.clone();
            std::thread::spawn(move || {
                for i in 0..100 {
                    state.push_new_nick(format!("{n}-{i}"));
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }
    assert_eq!(state.new_nicks().len(), 400);
    state.clear();
    assert!(state.new_nicks().is_empty());
}
