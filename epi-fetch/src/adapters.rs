//! Typed CRUD adapters for the backend resources, built on [`HttpClient`].

use std::{fmt, marker::PhantomData};

use futures::{FutureExt, future::BoxFuture};
use reqwest::Method;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;

use crate::{
    HttpClient, HttpError, PaginatedStore, RequestOptions, StoreOptions,
    ids::IdError,
    models::{
        Colaborador, Configuracao, Contratada, DevolucaoItem, Entrega, FichaEpi, ItemEstoque,
        MovimentacaoEstoque,
    },
    page::{Page, PageEnvelope},
    params::QueryParams,
};

/// Failures of an adapter call.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The backend call failed.
    #[error(transparent)]
    Http(#[from] HttpError),
    /// An identifier in the payload is malformed, nothing was sent.
    #[error("invalid {field}: {source}")]
    Validation {
        /// The payload field.
        field: &'static str,
        /// What is wrong with it.
        source: IdError,
    },
    /// The payload is otherwise unacceptable, nothing was sent.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    /// An empty or unusable resource id.
    #[error("invalid id: {0:?}")]
    InvalidId(String),
    /// The payload couldn't be serialized.
    #[error("could not encode request body: {0}")]
    Encode(String),
}

/// Checks (and may normalise) a payload before it's sent.
pub trait Validate: Sized {
    /// By default the payload is sent unchanged.
    fn validate(self) -> Result<Self, AdapterError> {
        Ok(self)
    }
}

/// A single resource response, either bare or wrapped as `{ "data": ... }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum SingleEnvelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> SingleEnvelope<T> {
    fn into_inner(self) -> T {
        match self {
            SingleEnvelope::Wrapped { data } => data,
            SingleEnvelope::Bare(value) => value,
        }
    }
}

/// CRUD calls for one backend resource under a fixed path prefix.
pub struct ResourceAdapter<T> {
    client: HttpClient,
    path: &'static str,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> Clone for ResourceAdapter<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            path: self.path,
            _phantom: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ResourceAdapter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceAdapter")
            .field("path", &self.path)
            .finish()
    }
}

impl<T> ResourceAdapter<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// An adapter for the resource at `path`, e.g. `/contratadas`.
    pub fn new(client: HttpClient, path: &'static str) -> Self {
        Self {
            client,
            path,
            _phantom: PhantomData,
        }
    }

    /// The resource path prefix.
    pub fn path(&self) -> &'static str {
        self.path
    }

    /// One page of the resource list, filtered, sorted and paginated by the backend.
    pub async fn list(&self, params: &QueryParams) -> Result<Page<T>, AdapterError> {
        let envelope: PageEnvelope<T> = self
            .client
            .request_json(
                Method::GET,
                self.path,
                RequestOptions::new().with_query(params.to_query_pairs()),
            )
            .await?;
        Ok(envelope.into_page(params.page, params.page_size))
    }

    /// A single resource by id.
    pub async fn get(&self, id: &str) -> Result<T, AdapterError> {
        let path = self.item_path(id)?;
        self.single(Method::GET, &path, RequestOptions::new()).await
    }

    /// Validate and create a resource, returning it as stored by the backend.
    pub async fn create<B>(&self, body: B) -> Result<T, AdapterError>
    where
        B: Serialize + Validate,
    {
        let body = encode(body.validate()?)?;
        self.single(
            Method::POST,
            self.path,
            RequestOptions::new().with_body(body),
        )
        .await
    }

    /// Validate and replace a resource, returning it as stored by the backend.
    pub async fn update<B>(&self, id: &str, body: B) -> Result<T, AdapterError>
    where
        B: Serialize + Validate,
    {
        let path = self.item_path(id)?;
        let body = encode(body.validate()?)?;
        self.single(Method::PUT, &path, RequestOptions::new().with_body(body))
            .await
    }

    /// Delete a resource.
    pub async fn delete(&self, id: &str) -> Result<(), AdapterError> {
        let path = self.item_path(id)?;
        self.client.delete(&path, RequestOptions::new()).await?;
        Ok(())
    }

    /// A page fetcher for [`PaginatedStore::new`] backed by [`Self::list`].
    pub fn page_fetcher(
        &self,
    ) -> impl Fn(QueryParams) -> BoxFuture<'static, Result<Page<T>, AdapterError>>
    + Send
    + Sync
    + 'static {
        let adapter = self.clone();
        move |params: QueryParams| {
            let adapter = adapter.clone();
            async move { adapter.list(&params).await }.boxed()
        }
    }

    /// A new [`PaginatedStore`] listing this resource.
    pub fn store(&self, options: StoreOptions) -> PaginatedStore<T> {
        PaginatedStore::new(self.page_fetcher(), options)
    }

    fn item_path(&self, id: &str) -> Result<String, AdapterError> {
        let id = id.trim();
        if id.is_empty() || id.contains(['/', '?', '#']) {
            return Err(AdapterError::InvalidId(id.to_string()));
        }
        Ok(format!("{}/{}", self.path.trim_end_matches('/'), id))
    }

    async fn single<V>(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<V, AdapterError>
    where
        V: DeserializeOwned,
    {
        let envelope: SingleEnvelope<V> = self.client.request_json(method, path, options).await?;
        Ok(envelope.into_inner())
    }
}

impl ResourceAdapter<Entrega> {
    /// Register the return of some or all of a delivery's items.
    pub async fn registrar_devolucao(
        &self,
        entrega_id: &str,
        itens: &[DevolucaoItem],
    ) -> Result<Entrega, AdapterError> {
        if itens.is_empty() || itens.iter().any(|item| item.quantidade == 0) {
            return Err(AdapterError::InvalidPayload(
                "a devolução needs at least one item with a positive quantity".to_string(),
            ));
        }
        let path = format!("{}/devolucao", self.item_path(entrega_id)?);
        let body = encode(json!({ "itens": itens }))?;
        self.single(Method::POST, &path, RequestOptions::new().with_body(body))
            .await
    }
}

impl ResourceAdapter<Configuracao> {
    /// Set a single configuration value.
    pub async fn atualizar(
        &self,
        chave: &str,
        valor: serde_json::Value,
    ) -> Result<Configuracao, AdapterError> {
        let path = self.item_path(chave)?;
        self.single(
            Method::PATCH,
            &path,
            RequestOptions::new().with_body(json!({ "valor": valor })),
        )
        .await
    }
}

fn encode<B: Serialize>(body: B) -> Result<serde_json::Value, AdapterError> {
    serde_json::to_value(body).map_err(|e| AdapterError::Encode(e.to_string()))
}

macro_rules! define_adapters {
    ($($name:ident: $entity:ty => $path:literal),* $(,)?) => {
        /// Every backend resource adapter, sharing one [`HttpClient`].
        ///
        /// Construct once and pass it to whatever needs backend access, there is no global instance.
        #[derive(Debug, Clone)]
        pub struct Adapters {
            client: HttpClient,
        }

        impl Adapters {
            /// Create the adapters around a client.
            pub fn new(client: HttpClient) -> Self {
                Self { client }
            }

            /// The shared client.
            pub fn client(&self) -> &HttpClient {
                &self.client
            }

            $(
                #[doc = concat!("Adapter for `", $path, "`.")]
                pub fn $name(&self) -> ResourceAdapter<$entity> {
                    ResourceAdapter::new(self.client.clone(), $path)
                }
            )*
        }

        paste::paste! {
            $(
                #[doc = concat!("Adapter for `", $path, "`.")]
                pub type [<$name:camel Adapter>] = ResourceAdapter<$entity>;
            )*
        }
    };
}

define_adapters! {
    contratadas: Contratada => "/contratadas",
    colaboradores: Colaborador => "/colaboradores",
    estoque_itens: ItemEstoque => "/estoque/itens",
    movimentacoes_estoque: MovimentacaoEstoque => "/estoque/movimentacoes",
    entregas: Entrega => "/entregas",
    fichas_epi: FichaEpi => "/fichas-epi",
    configuracoes: Configuracao => "/configuracoes",
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use axum::{
        Json, Router,
        extract::{Path, Query},
        http::StatusCode,
        routing::{get, patch, post},
    };
    use serde_json::{Value, json};

    use super::*;
    use crate::{ClientConfig, ParamsPatch, models::NovaContratada, test_utils::serve};

    async fn adapters(router: Router) -> Adapters {
        Adapters::new(
            HttpClient::new(
                ClientConfig::new(serve(router).await)
                    .with_max_retries(0)
                    .with_timeout(Duration::from_secs(2)),
            )
            .unwrap(),
        )
    }

    fn contratada_json(idx: usize) -> Value {
        json!({ "id": format!("c{idx}"), "nome": format!("Contratada {idx}"), "cnpj": "11222333000181" })
    }

    /// Pretends to hold 47 contratadas, honouring page and limit.
    fn contratadas_router(calls: Arc<AtomicUsize>) -> Router {
        Router::new().route(
            "/contratadas",
            get(move |Query(query): Query<HashMap<String, String>>| {
                calls.fetch_add(1, Ordering::Relaxed);
                async move {
                    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
                    let limit: usize = query.get("limit").and_then(|l| l.parse().ok()).unwrap_or(10);
                    let start = (page - 1) * limit;
                    let data = (start..(start + limit).min(47))
                        .map(contratada_json)
                        .collect::<Vec<_>>();
                    Json(json!({ "data": data, "total": 47, "page": page, "pageSize": limit }))
                }
            }),
        )
    }

    #[test]
    fn test_generated_aliases() {
        fn assert_alias(_: ContratadasAdapter, _: EstoqueItensAdapter, _: FichasEpiAdapter) {}
        let _ = assert_alias;
    }

    #[tokio::test]
    async fn test_list_passes_params_through() {
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let router = Router::new().route(
            "/colaboradores",
            get({
                let seen = seen.clone();
                move |Query(query): Query<HashMap<String, String>>| {
                    *seen.lock() = Some(query);
                    async { Json(json!({ "items": [], "total": 0, "limit": 5 })) }
                }
            }),
        );
        let adapters = adapters(router).await;

        let mut params = QueryParams::new(5);
        params.search = Some("silva".into());
        params
            .filters
            .insert("contratadaId".into(), "c1".into());
        let page = adapters.colaboradores().list(&params).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 0);

        let seen = seen.lock().clone().unwrap();
        assert_eq!(seen.get("page").map(String::as_str), Some("1"));
        assert_eq!(seen.get("limit").map(String::as_str), Some("5"));
        assert_eq!(seen.get("search").map(String::as_str), Some("silva"));
        assert_eq!(seen.get("contratadaId").map(String::as_str), Some("c1"));
    }

    #[tokio::test]
    async fn test_store_end_to_end() {
        let calls = Arc::new(AtomicUsize::new(0));
        let adapters = adapters(contratadas_router(calls.clone())).await;
        let store = adapters.contratadas().store(StoreOptions::new().with_page_size(10));

        store.fetch_page(ParamsPatch::new()).await;
        let state = store.state();
        assert_eq!(state.items.len(), 10);
        assert_eq!(state.total, 47);
        assert_eq!(state.total_pages, 5);
        assert!(store.has_next());
        assert!(!store.has_prev());

        for _ in 0..10 {
            store.next_page().await;
        }
        let state = store.state();
        assert_eq!(state.page, 5);
        assert_eq!(state.items.len(), 7);
        assert_eq!(state.items[0].id, "c40");
        assert_eq!(calls.load(Ordering::Relaxed), 5);

        // Back to the first page is served from the cache:
        store.go_to_page(1).await;
        assert_eq!(store.state().items[0].id, "c0");
        assert_eq!(calls.load(Ordering::Relaxed), 5);
    }

    #[tokio::test]
    async fn test_store_reports_backend_errors() {
        let router = Router::new().route(
            "/fichas-epi",
            get(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "message": "filtro invalido" })),
                )
            }),
        );
        let store = adapters(router).await.fichas_epi().store(StoreOptions::new());
        store.fetch_page(ParamsPatch::new()).await;
        let state = store.state();
        assert_eq!(state.error.as_deref(), Some("HTTP 400: filtro invalido"));
        assert!(!state.loading);
        assert!(state.items.is_empty());
    }

    #[tokio::test]
    async fn test_create_validates_before_sending() {
        let calls = Arc::new(AtomicUsize::new(0));
        let router = Router::new().route(
            "/contratadas",
            post({
                let calls = calls.clone();
                move |Json(body): Json<Value>| {
                    calls.fetch_add(1, Ordering::Relaxed);
                    async move {
                        let mut created = body;
                        created["id"] = json!("novo");
                        (StatusCode::CREATED, Json(json!({ "data": created })))
                    }
                }
            }),
        );
        let contratadas = adapters(router).await.contratadas();

        let err = contratadas
            .create(NovaContratada {
                nome: "Acme".into(),
                cnpj: "11.222.333/0001-82".into(),
                email: None,
                telefone: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Validation { field: "cnpj", .. }));
        assert_eq!(calls.load(Ordering::Relaxed), 0);

        let created = contratadas
            .create(NovaContratada {
                nome: "Acme".into(),
                cnpj: "11.222.333/0001-81".into(),
                email: Some("contato@acme.com.br".into()),
                telefone: None,
            })
            .await
            .unwrap();
        assert_eq!(created.id, "novo");
        assert_eq!(created.cnpj, "11222333000181");
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_get_bare_and_delete() {
        let router = Router::new().route(
            "/estoque/itens/{id}",
            get(|Path(id): Path<String>| async move {
                Json(json!({ "id": id, "nome": "Capacete", "quantidade": 12 }))
            })
            .delete(|| async { StatusCode::NO_CONTENT }),
        );
        let itens = adapters(router).await.estoque_itens();
        let item = itens.get("i7").await.unwrap();
        assert_eq!(item.id, "i7");
        assert_eq!(item.quantidade, 12);
        itens.delete("i7").await.unwrap();

        assert!(matches!(itens.get("  ").await, Err(AdapterError::InvalidId(_))));
        assert!(matches!(itens.get("a/b").await, Err(AdapterError::InvalidId(_))));
    }

    #[tokio::test]
    async fn test_registrar_devolucao() {
        let router = Router::new().route(
            "/entregas/{id}/devolucao",
            post(|Path(id): Path<String>, Json(body): Json<Value>| async move {
                let devolvida = body["itens"][0]["quantidade"].clone();
                Json(json!({
                    "id": id,
                    "colaboradorId": "col1",
                    "dataEntrega": "2024-03-01T12:00:00Z",
                    "status": "DEVOLVIDA",
                    "itens": [{ "itemEstoqueId": "i1", "quantidade": 2, "quantidadeDevolvida": devolvida }]
                }))
            }),
        );
        let entregas = adapters(router).await.entregas();

        assert!(matches!(
            entregas.registrar_devolucao("e1", &[]).await,
            Err(AdapterError::InvalidPayload(_))
        ));

        let entrega = entregas
            .registrar_devolucao(
                "e1",
                &[DevolucaoItem {
                    item_estoque_id: "i1".into(),
                    quantidade: 2,
                    motivo: Some("desligamento".into()),
                }],
            )
            .await
            .unwrap();
        assert_eq!(entrega.id, "e1");
        assert_eq!(entrega.itens[0].pendente_devolucao(), 0);
    }

    #[tokio::test]
    async fn test_atualizar_configuracao() {
        let router = Router::new().route(
            "/configuracoes/{chave}",
            patch(|Path(chave): Path<String>, Json(body): Json<Value>| async move {
                Json(json!({ "chave": chave, "valor": body["valor"] }))
            }),
        );
        let configuracao = adapters(router)
            .await
            .configuracoes()
            .atualizar("PERMITIR_ESTOQUE_NEGATIVO", json!(false))
            .await
            .unwrap();
        assert_eq!(configuracao.chave, "PERMITIR_ESTOQUE_NEGATIVO");
        assert_eq!(configuracao.valor, json!(false));
    }
}
