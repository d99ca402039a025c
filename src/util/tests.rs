#[test]
fn lock_survives_poison() {
    use std::sync::{Arc, Mutex};
    let mutex = Arc::new(Mutex::new(5i32));
    let mutex2 = mutex.clone();
    let _ = std::thread::spawn(move || {
        let _guard = mutex2.lock().unwrap();
        panic!("poisoning on purpose");
    })
    .join();
    assert!(mutex.is_poisoned());
    assert_eq!(*super::lock(&mutex), 5);
}

#[test]
fn panic_messages() {
    let payload = std::panic::catch_unwind(|| panic!("static str")).unwrap_err();
    assert_eq!(super::panic_message(payload.as_ref()), "static str");
    let payload = std::panic::catch_unwind(|| panic!("formatted {}", 42)).unwrap_err();
    assert_eq!(super::panic_message(payload.as_ref()), "formatted 42");
}
