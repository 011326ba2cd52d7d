use core_logic::KeyStore;
use tempfile::TempDir;

async fn open_store() -> (KeyStore, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("wallets.db");
    let store = KeyStore::open(path.to_str().expect("utf-8 path"))
        .await
        .expect("open store");
    (store, dir)
}

async fn set_progress(store: &KeyStore, id: i64, round: i64) {
    let mut record = store.find_by_id(id).await.unwrap().unwrap();
    record.transfer_progress = round;
    store.update(&record).await.unwrap();
}

async fn mark_staked(store: &KeyStore, id: i64) {
    let mut record = store.find_by_id(id).await.unwrap().unwrap();
    record.staking_complete = true;
    store.update(&record).await.unwrap();
}

async fn seed(store: &KeyStore, n: usize) -> Vec<i64> {
    let mut ids = Vec::new();
    for i in 0..n {
        let id = store
            .insert(
                &format!("0x{:040x}", i + 1),
                &format!("0x{:064x}", i + 1),
            )
            .await
            .expect("insert");
        ids.push(id);
    }
    ids
}

#[tokio::test]
async fn inserted_wallets_start_unstaked_with_zero_progress() {
    let (store, _dir) = open_store().await;
    seed(&store, 3).await;

    let wallets = store.find_pending(1, 10).await.unwrap();
    assert_eq!(wallets.len(), 3);
    for w in &wallets {
        assert_eq!(w.transfer_progress, 0);
        assert!(!w.staking_complete);
    }

    let mut addresses: Vec<_> = wallets.iter().map(|w| w.address.clone()).collect();
    addresses.sort();
    addresses.dedup();
    assert_eq!(addresses.len(), 3, "addresses must be pairwise distinct");
}

#[tokio::test]
async fn ids_are_assigned_in_creation_order() {
    let (store, _dir) = open_store().await;
    let ids = seed(&store, 5).await;

    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);

    let wallets = store.find_pending(1, 10).await.unwrap();
    let fetched: Vec<i64> = wallets.iter().map(|w| w.id).collect();
    assert_eq!(fetched, ids);
}

#[tokio::test]
async fn find_pending_honors_limit_and_progress_filter() {
    let (store, _dir) = open_store().await;
    let ids = seed(&store, 4).await;

    let page = store.find_pending(1, 2).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id, ids[0]);
    assert_eq!(page[1].id, ids[1]);

    set_progress(&store, ids[0], 1).await;
    set_progress(&store, ids[1], 1).await;

    let page = store.find_pending(1, 10).await.unwrap();
    let fetched: Vec<i64> = page.iter().map(|w| w.id).collect();
    assert_eq!(fetched, vec![ids[2], ids[3]]);

    // A higher round sees the advanced wallets again.
    let page = store.find_pending(2, 10).await.unwrap();
    assert_eq!(page.len(), 4);
}

#[tokio::test]
async fn staking_candidate_is_lowest_id_and_skips_staked() {
    let (store, _dir) = open_store().await;
    let ids = seed(&store, 3).await;
    for id in &ids {
        set_progress(&store, *id, 2).await;
    }

    let first = store.next_eligible_for_staking(2).await.unwrap().unwrap();
    assert_eq!(first.id, ids[0]);

    mark_staked(&store, ids[0]).await;
    let second = store.next_eligible_for_staking(2).await.unwrap().unwrap();
    assert_eq!(second.id, ids[1]);

    mark_staked(&store, ids[1]).await;
    mark_staked(&store, ids[2]).await;
    assert!(store.next_eligible_for_staking(2).await.unwrap().is_none());
}

#[tokio::test]
async fn staking_candidate_requires_full_transfer_progress() {
    let (store, _dir) = open_store().await;
    let ids = seed(&store, 2).await;
    set_progress(&store, ids[1], 2).await;

    // ids[0] still at progress 0, so only ids[1] qualifies for round count 2.
    let candidate = store.next_eligible_for_staking(2).await.unwrap().unwrap();
    assert_eq!(candidate.id, ids[1]);
}

#[tokio::test]
async fn next_after_walks_sweep_order() {
    let (store, _dir) = open_store().await;
    let ids = seed(&store, 3).await;

    let next = store.next_after(ids[0]).await.unwrap().unwrap();
    assert_eq!(next.id, ids[1]);
    let next = store.next_after(ids[1]).await.unwrap().unwrap();
    assert_eq!(next.id, ids[2]);
    assert!(store.next_after(ids[2]).await.unwrap().is_none());
}

#[tokio::test]
async fn find_by_id_returns_the_record() {
    let (store, _dir) = open_store().await;
    let ids = seed(&store, 2).await;

    let record = store.find_by_id(ids[1]).await.unwrap().unwrap();
    assert_eq!(record.id, ids[1]);
    assert!(store.find_by_id(ids[1] + 100).await.unwrap().is_none());
}

#[tokio::test]
async fn drop_all_removes_every_record() {
    let (store, _dir) = open_store().await;
    seed(&store, 4).await;

    assert_eq!(store.count().await.unwrap(), 4);
    let removed = store.drop_all().await.unwrap();
    assert_eq!(removed, 4);
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn export_writes_a_json_array_with_keys() {
    let (store, dir) = open_store().await;
    seed(&store, 2).await;

    let path = dir.path().join("export.json");
    let exported = store.export_all(path.to_str().unwrap()).await.unwrap();
    assert_eq!(exported, 2);

    let content = std::fs::read_to_string(&path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
    let array = parsed.as_array().unwrap();
    assert_eq!(array.len(), 2);
    for entry in array {
        assert!(entry.get("address").is_some());
        assert!(entry.get("private_key").is_some());
        assert!(entry.get("transfer_progress").is_some());
        assert!(entry.get("staking_complete").is_some());
    }
}

#[tokio::test]
async fn debug_output_redacts_private_keys() {
    let (store, _dir) = open_store().await;
    seed(&store, 1).await;

    let record = store.find_pending(1, 1).await.unwrap().remove(0);
    let rendered = format!("{:?}", record);
    assert!(rendered.contains("REDACTED"));
    assert!(!rendered.contains(&record.private_key));
}
