use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use contacts_import::{
    common::error::AppError,
    db::MemoryContactStore,
    models::{
        contacts::{CustomFieldType, NO_LIST_SENTINEL},
        import::{
            AttributeKey, ColumnMapping, DefineFieldRequest, ImportRequest, NewFieldRequest, ParsedFile,
        },
    },
    services::{
        external_sync::{SyncContact, SyncError},
        file_ingestor, ExternalSyncAdapter, ImportService, MarketingService, SyncSettings,
    },
};

// =============================================================================
//  APOIO
// =============================================================================

fn file(headers: &[&str], rows: &[&[&str]]) -> ParsedFile {
    ParsedFile {
        headers: headers.iter().map(|h| h.to_string()).collect(),
        rows: rows
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect(),
    }
}

fn mapping(pairs: &[(&str, &str)]) -> ColumnMapping {
    pairs
        .iter()
        .map(|(h, t)| (*h, AttributeKey::from(t.to_string())))
        .collect()
}

fn request(family_id: Uuid, mapping: ColumnMapping, list_ids: Vec<Uuid>) -> ImportRequest {
    ImportRequest {
        family_id,
        owner_user_id: Uuid::new_v4(),
        mapping,
        list_ids,
        new_fields: Vec::new(),
    }
}

fn niveau() -> NewFieldRequest {
    NewFieldRequest {
        name: "Niveau".into(),
        field_type: CustomFieldType::Text,
    }
}

fn define(field: NewFieldRequest, column: Option<&str>, mapping: ColumnMapping) -> DefineFieldRequest {
    DefineFieldRequest {
        field,
        column: column.map(str::to_string),
        mapping,
    }
}

fn alice_and_bob() -> ParsedFile {
    file(
        &["Prénom", "Email"],
        &[&["Alice", "alice@x.com"], &["Bob", "bob@x.com"]],
    )
}

fn setup() -> (Arc<MemoryContactStore>, ImportService, Uuid) {
    let store = Arc::new(MemoryContactStore::new());
    let service = ImportService::new(store.clone());
    (store, service, Uuid::new_v4())
}

/// Grava cada chamada recebida; falha tudo quando `fail` está ligado.
#[derive(Default)]
struct RecordingMarketing {
    fail: bool,
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl MarketingService for RecordingMarketing {
    async fn declare_field(
        &self,
        list_handle: &str,
        field_name: &str,
        field_type: CustomFieldType,
    ) -> Result<(), SyncError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("field:{list_handle}:{field_name}:{}", field_type.external_name()));
        if self.fail {
            return Err(SyncError::Transport("connexion refusée".into()));
        }
        Ok(())
    }

    async fn upsert_contact(&self, list_handle: &str, contact: &SyncContact) -> Result<(), SyncError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("contact:{list_handle}:{}", contact.email));
        if self.fail {
            return Err(SyncError::Remote { status: 500, body: "boom".into() });
        }
        Ok(())
    }
}

fn inline_sync(service: ImportService, marketing: Arc<RecordingMarketing>) -> ImportService {
    let settings = SyncSettings {
        workers: 4,
        call_timeout: Duration::from_secs(1),
        retry_backoff: Duration::from_millis(1),
    };
    service.with_sync(ExternalSyncAdapter::new(marketing, settings), false)
}

// =============================================================================
//  CENÁRIOS
// =============================================================================

#[tokio::test]
async fn scenario_a_creates_and_links_every_contact() {
    let (store, service, family) = setup();
    let l1 = store.add_list(family, "L1", None);

    let summary = service
        .run_import(
            &alice_and_bob(),
            request(family, mapping(&[("Prénom", "prenom"), ("Email", "email")]), vec![l1.id]),
        )
        .await
        .unwrap();

    assert_eq!(summary.contacts_created, 2);
    assert_eq!(summary.contacts_matched, 0);
    assert_eq!(summary.memberships_created, 2);
    assert_eq!(summary.custom_values_written, 0);
    assert_eq!(summary.list_ids, vec![l1.id]);

    let state = store.snapshot();
    assert_eq!(state.contacts.len(), 2);
    assert_eq!(state.memberships.len(), 2);
    assert!(state.custom_values.is_empty());
    assert_eq!(state.lists[0].nb_contacts, 2);

    let alice = state.contacts.iter().find(|c| c.email == "alice@x.com").unwrap();
    assert_eq!(alice.prenom.as_deref(), Some("Alice"));
    assert_eq!(alice.family_id, family);
}

#[tokio::test]
async fn scenario_b_matches_existing_contacts() {
    let (store, service, family) = setup();
    let l1 = store.add_list(family, "L1", None);
    let m = mapping(&[("Prénom", "prenom"), ("Email", "email")]);

    service
        .run_import(
            &file(&["Prénom", "Email"], &[&["Alice", "alice@x.com"]]),
            request(family, m.clone(), vec![l1.id]),
        )
        .await
        .unwrap();

    let summary = service
        .run_import(&alice_and_bob(), request(family, m, vec![l1.id]))
        .await
        .unwrap();

    assert_eq!(summary.contacts_created, 1);
    assert_eq!(summary.contacts_matched, 1);
    // Alice já estava em L1: só Bob ganha um vínculo novo
    assert_eq!(summary.memberships_created, 1);
    assert_eq!(store.snapshot().memberships.len(), 2);
}

#[tokio::test]
async fn scenario_c_creates_the_field_and_skips_empty_cells() {
    let (store, service, family) = setup();
    let l1 = store.add_list(family, "L1", None);
    let parsed = file(
        &["Email", "Niveau"],
        &[&["alice@x.com", "Gold"], &["bob@x.com", ""]],
    );

    let mut req = request(family, mapping(&[("Email", "email"), ("Niveau", "Niveau")]), vec![l1.id]);
    req.new_fields = vec![niveau()];
    let summary = service.run_import(&parsed, req).await.unwrap();

    assert_eq!(summary.fields_created, 1);
    assert_eq!(summary.custom_values_written, 1);

    let state = store.snapshot();
    assert_eq!(state.custom_fields.len(), 1);
    assert_eq!(state.custom_fields[0].name, "Niveau");
    assert_eq!(state.custom_values.len(), 1);
    assert_eq!(state.custom_values[0].value, "Gold");
    assert_eq!(state.custom_values[0].custom_field_id, state.custom_fields[0].id);
}

// =============================================================================
//  PROPRIEDADES
// =============================================================================

#[tokio::test]
async fn importing_twice_does_not_duplicate_contacts() {
    let (store, service, family) = setup();
    let l1 = store.add_list(family, "L1", None);
    let m = mapping(&[("Prénom", "prenom"), ("Email", "email")]);

    service
        .run_import(&alice_and_bob(), request(family, m.clone(), vec![l1.id]))
        .await
        .unwrap();
    let second = service
        .run_import(&alice_and_bob(), request(family, m, vec![l1.id]))
        .await
        .unwrap();

    assert_eq!(second.contacts_created, 0);
    assert_eq!(second.contacts_matched, 2);
    assert_eq!(second.memberships_created, 0);
    assert_eq!(store.contacts_in(family).len(), 2);
    assert_eq!(store.snapshot().memberships.len(), 2);
}

#[tokio::test]
async fn reimport_appends_custom_values_again() {
    let (store, service, family) = setup();
    let l1 = store.add_list(family, "L1", None);
    let parsed = file(&["Email", "Niveau"], &[&["alice@x.com", "Gold"]]);
    let m = mapping(&[("Email", "email"), ("Niveau", "Niveau")]);

    let mut first = request(family, m.clone(), vec![l1.id]);
    first.new_fields = vec![niveau()];
    service.run_import(&parsed, first).await.unwrap();
    service
        .run_import(&parsed, request(family, m, vec![l1.id]))
        .await
        .unwrap();

    // Valores personalizados não têm chave (contato, campo): o segundo
    // import grava outra linha para o mesmo par.
    let state = store.snapshot();
    assert_eq!(state.contacts.len(), 1);
    assert_eq!(state.custom_values.len(), 2);
}

#[tokio::test]
async fn no_list_sentinel_with_other_lists_writes_nothing() {
    let (store, service, family) = setup();
    let sentinel = store.add_list(family, NO_LIST_SENTINEL, None);
    let l1 = store.add_list(family, "L1", None);
    let parsed = file(&["Email", "Niveau"], &[&["alice@x.com", "Gold"]]);

    let mut req = request(
        family,
        mapping(&[("Email", "email"), ("Niveau", "Niveau")]),
        vec![sentinel.id, l1.id],
    );
    req.new_fields = vec![niveau()];
    let err = service.run_import(&parsed, req).await.unwrap_err();

    assert!(matches!(err, AppError::ConflictingListSelection));
    let state = store.snapshot();
    assert!(state.contacts.is_empty());
    assert!(state.custom_fields.is_empty());
    assert!(state.memberships.is_empty());
}

#[tokio::test]
async fn empty_list_selection_is_rejected_server_side() {
    let (store, service, family) = setup();

    let err = service
        .run_import(
            &alice_and_bob(),
            request(family, mapping(&[("Prénom", "prenom"), ("Email", "email")]), Vec::new()),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NoListSelected));
    assert!(store.snapshot().contacts.is_empty());
}

#[tokio::test]
async fn mapping_errors_are_raised_before_any_write() {
    let (store, service, family) = setup();
    let l1 = store.add_list(family, "L1", None);

    let err = service
        .run_import(
            &alice_and_bob(),
            request(family, mapping(&[("Prénom", "prenom"), ("Email", "ignore")]), vec![l1.id]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MissingEmailMapping));

    let parsed = file(&["Email", "Niveau"], &[&["alice@x.com", "Gold"]]);
    let err = service
        .run_import(
            &parsed,
            request(family, mapping(&[("Email", "email"), ("Niveau", "Niveau")]), vec![l1.id]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UnknownCustomField(ref name) if name == "Niveau"));

    assert!(store.snapshot().contacts.is_empty());
}

#[tokio::test]
async fn a_rejected_contact_batch_leaves_no_partial_state() {
    let (store, service, family) = setup();
    let l1 = store.add_list(family, "L1", None);
    store.fail_next_contact_insert();

    let result = service
        .run_import(
            &alice_and_bob(),
            request(family, mapping(&[("Prénom", "prenom"), ("Email", "email")]), vec![l1.id]),
        )
        .await;

    assert!(result.is_err());
    let state = store.snapshot();
    assert!(state.contacts.is_empty());
    assert!(state.memberships.is_empty());
    assert!(state.custom_values.is_empty());
}

#[tokio::test]
async fn emails_are_matched_without_case() {
    let (store, service, family) = setup();
    let l1 = store.add_list(family, "L1", None);
    let m = mapping(&[("Email", "email")]);

    service
        .run_import(&file(&["Email"], &[&["alice@x.com"]]), request(family, m.clone(), vec![l1.id]))
        .await
        .unwrap();
    let summary = service
        .run_import(&file(&["Email"], &[&["  Alice@X.COM "]]), request(family, m, vec![l1.id]))
        .await
        .unwrap();

    assert_eq!(summary.contacts_created, 0);
    assert_eq!(summary.contacts_matched, 1);
    assert_eq!(store.contacts_in(family).len(), 1);
}

#[tokio::test]
async fn repeated_emails_in_one_file_keep_the_first_row() {
    let (store, service, family) = setup();
    let l1 = store.add_list(family, "L1", None);
    let parsed = file(
        &["Prénom", "Email", "Niveau"],
        &[
            &["Alice", "alice@x.com", "Gold"],
            &["Alicia", "ALICE@x.com", "Silver"],
            &["", "", "Bronze"],
        ],
    );

    let mut req = request(
        family,
        mapping(&[("Prénom", "prenom"), ("Email", "email"), ("Niveau", "Niveau")]),
        vec![l1.id],
    );
    req.new_fields = vec![niveau()];
    let summary = service.run_import(&parsed, req).await.unwrap();

    assert_eq!(summary.contacts_created, 1);
    assert_eq!(summary.duplicate_rows, 1);
    assert_eq!(summary.rows_without_email, 1);
    // Um valor por ocorrência com e-mail
    assert_eq!(summary.custom_values_written, 2);

    let contacts = store.contacts_in(family);
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].prenom.as_deref(), Some("Alice"));
}

#[tokio::test]
async fn families_do_not_see_each_other() {
    let (store, service, family) = setup();
    let other = Uuid::new_v4();
    let mine = store.add_list(family, "L1", None);
    let theirs = store.add_list(other, "L1", None);
    let m = mapping(&[("Email", "email")]);
    let parsed = file(&["Email"], &[&["alice@x.com"]]);

    service
        .run_import(&parsed, request(other, m.clone(), vec![theirs.id]))
        .await
        .unwrap();
    let summary = service
        .run_import(&parsed, request(family, m.clone(), vec![mine.id]))
        .await
        .unwrap();
    assert_eq!(summary.contacts_created, 1);

    let err = service
        .run_import(&parsed, request(family, m, vec![theirs.id]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ListNotFound(id) if id == theirs.id));
}

// =============================================================================
//  SINCRONIZAÇÃO EXTERNA
// =============================================================================

#[tokio::test]
async fn fields_are_pushed_before_contacts() {
    let (store, service, family) = setup();
    let marketing = Arc::new(RecordingMarketing::default());
    let service = inline_sync(service, marketing.clone());
    let synced = store.add_list(family, "Newsletter", Some("42"));
    let local = store.add_list(family, "Interne", None);
    let parsed = file(
        &["Email", "Niveau"],
        &[&["alice@x.com", "Gold"], &["bob@x.com", "Silver"]],
    );

    let mut req = request(
        family,
        mapping(&[("Email", "email"), ("Niveau", "Niveau")]),
        vec![synced.id, local.id],
    );
    req.new_fields = vec![niveau()];
    let summary = service.run_import(&parsed, req).await.unwrap();

    let report = summary.sync.expect("sincronização em linha");
    assert_eq!(report.fields_declared, 1);
    assert_eq!(report.contacts_pushed, 2);
    assert!(report.failures.is_empty());

    let calls = marketing.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0], "field:42:Niveau:text");
    assert!(calls[1..].iter().all(|c| c.starts_with("contact:42:")));
}

#[tokio::test]
async fn sync_failures_never_fail_the_import() {
    let (store, service, family) = setup();
    let marketing = Arc::new(RecordingMarketing {
        fail: true,
        ..Default::default()
    });
    let service = inline_sync(service, marketing.clone());
    let synced = store.add_list(family, "Newsletter", Some("42"));

    let summary = service
        .run_import(
            &alice_and_bob(),
            request(family, mapping(&[("Prénom", "prenom"), ("Email", "email")]), vec![synced.id]),
        )
        .await
        .unwrap();

    assert_eq!(summary.contacts_created, 2);
    let report = summary.sync.unwrap();
    assert_eq!(report.contacts_pushed, 0);
    assert_eq!(report.failures.len(), 2);
    // Cada contato foi tentado duas vezes (um retry)
    assert_eq!(marketing.calls.lock().unwrap().len(), 4);
    assert_eq!(store.contacts_in(family).len(), 2);
}

#[tokio::test]
async fn lists_without_external_handle_are_not_synced() {
    let (store, service, family) = setup();
    let marketing = Arc::new(RecordingMarketing::default());
    let service = inline_sync(service, marketing.clone());
    let l1 = store.add_list(family, "L1", None);

    let summary = service
        .run_import(
            &alice_and_bob(),
            request(family, mapping(&[("Prénom", "prenom"), ("Email", "email")]), vec![l1.id]),
        )
        .await
        .unwrap();

    assert!(summary.sync.is_none());
    assert!(marketing.calls.lock().unwrap().is_empty());
}

// =============================================================================
//  DO ARQUIVO AO RESUMO
// =============================================================================

#[tokio::test]
async fn a_csv_upload_goes_through_the_whole_pipeline() {
    let (store, service, family) = setup();
    let l1 = store.add_list(family, "L1", None);
    let bytes = "Prénom;Nom;Courriel\nAlice;Martin;alice@x.com\nBob;Durand;bob@x.com\n".as_bytes();

    let parsed = file_ingestor::ingest(Some("contacts.csv"), Some("text/csv"), bytes).unwrap();
    let preview = service.preview(family, &parsed).await.unwrap();

    assert_eq!(preview.row_count, 2);
    assert_eq!(preview.detected_email_column.as_deref(), Some("Courriel"));

    let mut m = preview.mapping.clone();
    m.assign("Prénom", AttributeKey::from("prenom".to_string()));
    m.assign("Nom", AttributeKey::from("nom".to_string()));
    service
        .validate_mapping(family, &parsed.headers, &m)
        .await
        .unwrap();

    let summary = service
        .run_import(&parsed, request(family, m, vec![l1.id]))
        .await
        .unwrap();

    assert_eq!(summary.contacts_created, 2);
    let bob = store
        .contacts_in(family)
        .into_iter()
        .find(|c| c.email == "bob@x.com")
        .unwrap();
    assert_eq!(bob.nom.as_deref(), Some("Durand"));
}

#[tokio::test]
async fn fields_defined_ahead_of_time_can_be_mapped() {
    let (store, service, family) = setup();
    let l1 = store.add_list(family, "L1", None);

    let ahead = define(niveau(), None, ColumnMapping::default());
    let defined = service.define_custom_field(family, &ahead).await.unwrap();
    assert!(defined.mapping.entries.is_empty());
    let err = service.define_custom_field(family, &ahead).await.unwrap_err();
    assert!(matches!(err, AppError::DuplicateFieldName(_)));

    let parsed = file(&["Email", "Level"], &[&["alice@x.com", "Gold"]]);
    let summary = service
        .run_import(
            &parsed,
            request(family, mapping(&[("Email", "email"), ("Level", "niveau")]), vec![l1.id]),
        )
        .await
        .unwrap();

    assert_eq!(summary.custom_values_written, 1);
    assert_eq!(service.list_custom_fields(family).await.unwrap().len(), 1);
}

#[tokio::test]
async fn defining_a_field_points_its_column_at_it() {
    let (store, service, family) = setup();
    let l1 = store.add_list(family, "L1", None);
    let proposed = mapping(&[("Email", "email"), ("Level", "ignore")]);

    let defined = service
        .define_custom_field(family, &define(niveau(), Some("Level"), proposed))
        .await
        .unwrap();

    assert_eq!(defined.field.name, "Niveau");
    assert_eq!(defined.mapping.get("Level"), Some(&AttributeKey::Custom("Niveau".into())));
    assert_eq!(defined.mapping.get("Email"), Some(&AttributeKey::from("email".to_string())));

    let parsed = file(&["Email", "Level"], &[&["alice@x.com", "Gold"]]);
    let summary = service
        .run_import(&parsed, request(family, defined.mapping, vec![l1.id]))
        .await
        .unwrap();
    assert_eq!(summary.custom_values_written, 1);
}

#[tokio::test]
async fn defining_a_field_for_an_unknown_column_creates_nothing() {
    let (_store, service, family) = setup();
    let proposed = mapping(&[("Email", "email")]);

    let err = service
        .define_custom_field(family, &define(niveau(), Some("Level"), proposed))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::UnknownColumn(ref c) if c == "Level"));
    assert!(service.list_custom_fields(family).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_imports_of_one_family_run_one_after_the_other() {
    let (store, service, family) = setup();
    let l1 = store.add_list(family, "L1", None);
    let parsed = alice_and_bob();
    let m = mapping(&[("Prénom", "prenom"), ("Email", "email")]);

    let (a, b) = tokio::join!(
        service.run_import(&parsed, request(family, m.clone(), vec![l1.id])),
        service.run_import(&parsed, request(family, m.clone(), vec![l1.id])),
    );

    let a = a.unwrap();
    let b = b.unwrap();
    let mut outcomes = vec![
        (a.contacts_created, a.contacts_matched),
        (b.contacts_created, b.contacts_matched),
    ];
    outcomes.sort();
    assert_eq!(outcomes, vec![(0, 2), (2, 0)]);
    assert_eq!(store.contacts_in(family).len(), 2);
}

#[tokio::test]
async fn long_cells_are_stored_whole() {
    let (store, service, family) = setup();
    let l1 = store.add_list(family, "L1", None);
    let entreprise = "Société ".repeat(200);
    let parsed = file(
        &["Email", "Entreprise"],
        &[&["alice@x.com", entreprise.as_str()]],
    );

    let summary = service
        .run_import(
            &parsed,
            request(family, mapping(&[("Email", "email"), ("Entreprise", "entreprise")]), vec![l1.id]),
        )
        .await
        .unwrap();

    assert_eq!(summary.contacts_created, 1);
    let alice = &store.contacts_in(family)[0];
    assert_eq!(alice.entreprise.as_deref(), Some(entreprise.trim()));
}
