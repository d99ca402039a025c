use super::CommandQueue;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn fifo() {
    let queue = CommandQueue::new();
    queue.add([1, 2]);
    queue.push(3);
    assert_eq!(queue.len(), 3);
    assert_eq!(queue.dequeue(), 1);
    assert_eq!(queue.dequeue(), 2);
    assert_eq!(queue.dequeue(), 3);
    assert!(queue.is_empty());
    assert_eq!(queue.try_dequeue(), None);
}

#[test]
fn dequeue_blocks_until_add() {
    let queue = Arc::new(CommandQueue::new());
    let queue2 = queue.clone();
    let then = std::time::Instant::now();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        queue2.push("late");
    });
    assert_eq!(queue.dequeue(), "late");
    assert!(then.elapsed() >= Duration::from_millis(100), "probable non-block");
}

#[test]
fn dequeue_timeout_expires() {
    let queue = CommandQueue::<u8>::new();
    assert_eq!(queue.dequeue_timeout(Duration::from_millis(50)), None);
    queue.push(7);
    assert_eq!(queue.dequeue_timeout(Duration::from_millis(50)), Some(7));
}

#[test]
fn many_producers() {
    const PRODUCERS: usize = 8;
    const EACH: usize = 500;
    let queue = Arc::new(CommandQueue::new());
    let consumer = {
        let queue = queue.clone();
        std::thread::spawn(move || {
            let mut seen = vec![Vec::new(); PRODUCERS];
            for _ in 0..PRODUCERS * EACH {
                let (producer, n): (usize, usize) = queue.dequeue();
                seen[producer].push(n);
            }
            seen
        })
    };
    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let queue = queue.clone();
            std::thread::spawn(move || {
                for n in 0..EACH {
                    queue.push((producer, n));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    let seen = consumer.join().unwrap();
    for per_producer in seen {
        // Every item exactly once, in each producer's own order.
        assert_eq!(per_producer, (0..EACH).collect::<Vec<_>>());
    }
    assert!(queue.is_empty());
}

#[test]
fn two_consumers_both_wake() {
    let queue = Arc::new(CommandQueue::new());
    let consumers: Vec<_> = (0..2)
        .map(|_| {
            let queue = queue.clone();
            std::thread::spawn(move || queue.dequeue())
        })
        .collect();
    std::thread::sleep(Duration::from_millis(100));
    queue.add([1, 2]);
    let mut got: Vec<i32> = consumers.into_iter().map(|c| c.join().unwrap()).collect();
    got.sort_unstable();
    assert_eq!(got, [1, 2]);
}

#[test]
fn drain_empties() {
    let queue: CommandQueue<_> = (0..4).collect();
    assert_eq!(queue.drain(), [0, 1, 2, 3]);
    assert!(queue.is_empty());
}
