// src/db/contacts_repo.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::{map_unique_violation, AppError},
    db::ContactStore,
    models::contacts::{
        Contact, ContactList, CustomFieldDefinition, CustomFieldType, ListMembership, NewContact,
        NewCustomFieldValue,
    },
};

// O Postgres aceita no máximo 65535 binds por comando.
const INSERT_CHUNK: usize = 1000;

const CONTACT_COLUMNS: &str =
    "id, family_id, owner_user_id, prenom, nom, email, entreprise, telephone, created_at";

const LIST_COLUMNS: &str = "id, family_id, nom, nb_contacts, external_list_handle, created_at";

const FIELD_COLUMNS: &str = "id, family_id, name, field_type, created_at";

#[derive(Clone)]
pub struct ContactRepository {
    pool: PgPool,
}

impl ContactRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactStore for ContactRepository {
    // =========================================================================
    //  CONTATOS
    // =========================================================================

    async fn find_contacts_by_emails(
        &self,
        family_id: Uuid,
        emails: &[String],
    ) -> Result<Vec<Contact>, AppError> {
        if emails.is_empty() {
            return Ok(Vec::new());
        }

        // Uma única consulta por lote: WHERE email IN (...)
        let contacts = sqlx::query_as::<_, Contact>(&format!(
            r#"
            SELECT {CONTACT_COLUMNS}
            FROM contacts
            WHERE family_id = $1
            AND lower(email) = ANY($2)
            "#
        ))
        .bind(family_id)
        .bind(emails)
        .fetch_all(&self.pool)
        .await?;

        Ok(contacts)
    }

    async fn insert_contacts(
        &self,
        family_id: Uuid,
        owner_user_id: Uuid,
        contacts: &[NewContact],
    ) -> Result<Vec<Contact>, AppError> {
        if contacts.is_empty() {
            return Ok(Vec::new());
        }

        // Todos os blocos na mesma transação: se um falhar, nada é gravado.
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(contacts.len());

        for chunk in contacts.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO contacts (family_id, owner_user_id, prenom, nom, email, entreprise, telephone) ",
            );
            builder.push_values(chunk, |mut row, contact| {
                row.push_bind(family_id)
                    .push_bind(owner_user_id)
                    .push_bind(contact.prenom.clone())
                    .push_bind(contact.nom.clone())
                    .push_bind(contact.email.clone())
                    .push_bind(contact.entreprise.clone())
                    .push_bind(contact.telephone.clone());
            });
            builder.push(format!(" RETURNING {CONTACT_COLUMNS}"));

            let rows = builder
                .build_query_as::<Contact>()
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| {
                    map_unique_violation(e, || {
                        AppError::UniqueConstraintViolation(
                            "Un contact avec cet email existe déjà dans la famille.".into(),
                        )
                    })
                })?;
            created.extend(rows);
        }

        tx.commit().await?;
        Ok(created)
    }

    // =========================================================================
    //  LISTAS
    // =========================================================================

    async fn list_lists(&self, family_id: Uuid) -> Result<Vec<ContactList>, AppError> {
        let lists = sqlx::query_as::<_, ContactList>(&format!(
            "SELECT {LIST_COLUMNS} FROM contact_lists WHERE family_id = $1 ORDER BY nom ASC"
        ))
        .bind(family_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lists)
    }

    async fn find_lists(
        &self,
        family_id: Uuid,
        list_ids: &[Uuid],
    ) -> Result<Vec<ContactList>, AppError> {
        let lists = sqlx::query_as::<_, ContactList>(&format!(
            "SELECT {LIST_COLUMNS} FROM contact_lists WHERE family_id = $1 AND id = ANY($2)"
        ))
        .bind(family_id)
        .bind(list_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(lists)
    }

    async fn find_memberships(
        &self,
        contact_ids: &[Uuid],
        list_ids: &[Uuid],
    ) -> Result<Vec<ListMembership>, AppError> {
        if contact_ids.is_empty() || list_ids.is_empty() {
            return Ok(Vec::new());
        }

        let edges = sqlx::query_as::<_, ListMembership>(
            r#"
            SELECT contact_id, list_id
            FROM list_memberships
            WHERE contact_id = ANY($1)
            AND list_id = ANY($2)
            "#,
        )
        .bind(contact_ids)
        .bind(list_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(edges)
    }

    async fn insert_memberships(&self, edges: &[ListMembership]) -> Result<u64, AppError> {
        if edges.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in edges.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO list_memberships (contact_id, list_id) ");
            builder.push_values(chunk, |mut row, edge| {
                row.push_bind(edge.contact_id).push_bind(edge.list_id);
            });
            // A chave primária é a guarda real contra importações concorrentes
            builder.push(" ON CONFLICT (contact_id, list_id) DO NOTHING");

            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn refresh_list_counts(&self, list_ids: &[Uuid]) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE contact_lists l
            SET nb_contacts = (
                SELECT COUNT(*) FROM list_memberships m WHERE m.list_id = l.id
            )
            WHERE l.id = ANY($1)
            "#,
        )
        .bind(list_ids)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    //  CAMPOS PERSONALIZADOS
    // =========================================================================

    async fn list_custom_fields(
        &self,
        family_id: Uuid,
    ) -> Result<Vec<CustomFieldDefinition>, AppError> {
        let fields = sqlx::query_as::<_, CustomFieldDefinition>(&format!(
            r#"
            SELECT {FIELD_COLUMNS}
            FROM custom_field_definitions
            WHERE family_id = $1
            ORDER BY created_at ASC
            "#
        ))
        .bind(family_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(fields)
    }

    async fn insert_custom_field(
        &self,
        family_id: Uuid,
        name: &str,
        field_type: CustomFieldType,
    ) -> Result<CustomFieldDefinition, AppError> {
        // O índice único (family_id, lower(name)) resolve a corrida entre duas importações
        sqlx::query_as::<_, CustomFieldDefinition>(&format!(
            r#"
            INSERT INTO custom_field_definitions (family_id, name, field_type)
            VALUES ($1, $2, $3)
            RETURNING {FIELD_COLUMNS}
            "#
        ))
        .bind(family_id)
        .bind(name)
        .bind(field_type)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, || AppError::DuplicateFieldName(name.to_string())))
    }

    async fn insert_custom_field_values(
        &self,
        values: &[NewCustomFieldValue],
    ) -> Result<u64, AppError> {
        if values.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in values.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO custom_field_values (contact_id, custom_field_id, value) ",
            );
            builder.push_values(chunk, |mut row, value| {
                row.push_bind(value.contact_id)
                    .push_bind(value.custom_field_id)
                    .push_bind(value.value.clone());
            });

            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }
}
