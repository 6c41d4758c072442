use pastebin::{
    constants::{DENYLISTED_PHRASES, ID_LENGTH},
    database::Database,
    models::IdKind,
    services::PasteService,
    store::PasteStore,
};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

async fn file_db() -> (Database, TempDir) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("pastes.db").display());
    let db = Database::new(&url).await.unwrap();
    db.migrate().await.unwrap();
    (db, dir)
}

fn service(store: Arc<dyn PasteStore>) -> Arc<PasteService> {
    let deny_list = DENYLISTED_PHRASES.iter().map(|p| p.to_string()).collect();
    Arc::new(PasteService::new(store, deny_list, "https://ig.lc"))
}

#[tokio::test]
async fn concurrent_creates_get_distinct_ids() {
    let (db, _dir) = file_db().await;
    let service = service(Arc::new(db.clone()));

    let mut handles = Vec::new();
    for i in 0..64 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let content = format!("paste number {i}");
            let created = service
                .create(content.as_bytes(), IdKind::Standard)
                .await
                .unwrap();
            (created.id, content)
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        let (id, content) = handle.await.unwrap();
        assert_eq!(id.len(), ID_LENGTH);
        assert_eq!(service.retrieve(&id).await.unwrap(), content.as_bytes());
        assert!(ids.insert(id));
    }

    assert_eq!(db.count_live().await.unwrap(), 64);
}

#[tokio::test]
async fn racing_creates_on_one_id_have_a_single_winner() {
    let (db, _dir) = file_db().await;

    let mut handles = Vec::new();
    for i in 0..16u8 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            db.create("samekey", &[i]).await.unwrap()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(db.count_live().await.unwrap(), 1);
}

#[tokio::test]
async fn pastes_survive_reopening_the_database() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("pastes.db").display());

    let id = {
        let db = Database::new(&url).await.unwrap();
        db.migrate().await.unwrap();
        let created = service(Arc::new(db))
            .create(b"durable", IdKind::Secure)
            .await
            .unwrap();
        created.id
    };

    let db = Database::new(&url).await.unwrap();
    db.migrate().await.unwrap();
    assert_eq!(db.get(&id).await.unwrap(), Some(b"durable".to_vec()));
}
