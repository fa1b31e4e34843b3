//! End-to-end behaviour of the shared index.

use pretty_assertions::assert_eq;
use ref_index::{Index, IndexConfig, LockMode, SNAPSHOT_VERSION, Wait, create_index};
use std::sync::Arc;
use std::thread;

fn search(index: &Index, pattern: &str) -> Vec<String> {
    let mut hits = Vec::new();
    assert!(index.search(pattern, &mut hits, Wait::Block).unwrap());
    hits
}

#[test]
fn onion_scenario() {
    let index = Index::new();
    assert!(index.add("onion", "Page 5", Wait::NoWait));
    assert!(search(&index, "onion").contains(&"Page 5".to_string()));

    assert!(index.remove("Page 5", Wait::NoWait));
    assert!(search(&index, "onion").is_empty());
    assert!(!index.term_exists("onion", Wait::NoWait));
    assert!(!index.reference_exists("Page 5", Wait::NoWait));
}

#[test]
fn pattern_spanning_terms_matches_nothing() {
    let index = Index::new();
    index.add("beef", "PageSix", Wait::NoWait);
    index.add("wellington", "PageSix", Wait::NoWait);
    index.add("beef", "PageFive", Wait::NoWait);

    assert!(search(&index, "ee ll").is_empty());
    assert_eq!(search(&index, "beef"), vec!["PageFive", "PageSix"]);
    assert_eq!(
        index.all_terms("PageSix", Wait::NoWait),
        vec!["beef", "wellington"]
    );
}

#[test]
fn save_then_load_on_fresh_instance() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recipes.dat");

    let index = Index::new();
    index.add("beef", "PageSix", Wait::NoWait);
    index.add("wellington", "PageSix", Wait::NoWait);
    index.add("beef", "PageFive", Wait::NoWait);
    assert!(index.save(&path, Wait::NoWait).unwrap());

    let fresh = Index::new();
    assert!(fresh.load(&path, Wait::NoWait).unwrap());
    assert_eq!(fresh.entries(Wait::NoWait), index.entries(Wait::NoWait));
    assert_eq!(SNAPSHOT_VERSION, 1);
}

#[test]
fn shared_index_across_threads() {
    let index = create_index(IndexConfig::default());
    let wait = Wait::Block;

    let writers: Vec<_> = (0..8)
        .map(|w| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for i in 0..50 {
                    assert!(index.add(&format!("term{}", i % 10), &format!("w{}-{}", w, i), wait));
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for _ in 0..50 {
                    let mut hits = Vec::new();
                    assert!(index.search("term", &mut hits, wait).unwrap());
                    let mut sorted = hits.clone();
                    sorted.sort();
                    sorted.dedup();
                    assert_eq!(hits, sorted);
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }

    let stats = index.stats(Wait::NoWait).unwrap();
    assert_eq!(stats.terms, 10);
    assert_eq!(stats.references, 400);
    assert_eq!(stats.postings, 400);
    assert!(index.locks().is_idle());
}

#[test]
fn concurrent_removes_leave_no_empty_terms() {
    let index = Arc::new(Index::new());
    for i in 0..20 {
        index.add(&format!("t{}", i % 4), &format!("r{}", i), Wait::NoWait);
    }

    let removers: Vec<_> = (0..20)
        .map(|i| {
            let index = Arc::clone(&index);
            thread::spawn(move || index.remove(&format!("r{}", i), Wait::Block))
        })
        .collect();
    for handle in removers {
        assert!(handle.join().unwrap());
    }

    assert_eq!(index.entries(Wait::NoWait).unwrap().len(), 0);
    assert!(index.locks().is_idle());
}

#[test]
fn readers_hold_off_edits_until_last_release() {
    let index = Index::new();
    let locks = index.locks();
    for _ in 0..3 {
        assert!(locks.acquire(LockMode::Read, Wait::NoWait));
    }
    assert!(locks.release(LockMode::Read));
    assert_eq!(locks.held(LockMode::Read), 2);

    assert!(!index.add("onion", "Page 5", Wait::NoWait));
    assert!(!index.term_exists("onion", Wait::NoWait));

    assert!(locks.release(LockMode::Read));
    assert!(locks.release(LockMode::Read));
    assert!(index.add("onion", "Page 5", Wait::NoWait));
}
