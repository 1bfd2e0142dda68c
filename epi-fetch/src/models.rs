//! Backend entities and request payloads, with the backend's camelCase field names.

use serde::{Deserialize, Serialize};

use crate::{
    adapters::{AdapterError, Validate},
    ids,
};

fn default_true() -> bool {
    true
}

/// A contractor company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contratada {
    pub id: String,
    pub nome: String,
    pub cnpj: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub telefone: Option<String>,
    #[serde(default = "default_true")]
    pub ativo: bool,
}

/// Payload to create or replace a [`Contratada`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NovaContratada {
    pub nome: String,
    pub cnpj: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,
}

impl Validate for NovaContratada {
    /// The CNPJ must be valid and is sent as plain digits.
    fn validate(mut self) -> Result<Self, AdapterError> {
        self.cnpj = ids::validate_cnpj(&self.cnpj).map_err(|source| AdapterError::Validation {
            field: "cnpj",
            source,
        })?;
        Ok(self)
    }
}

/// An employee, optionally working for a [`Contratada`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Colaborador {
    pub id: String,
    pub nome: String,
    pub cpf: String,
    #[serde(default)]
    pub matricula: Option<String>,
    #[serde(default)]
    pub cargo: Option<String>,
    #[serde(default)]
    pub contratada_id: Option<String>,
    #[serde(default = "default_true")]
    pub ativo: bool,
}

/// Payload to create or replace a [`Colaborador`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NovoColaborador {
    pub nome: String,
    pub cpf: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matricula: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cargo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contratada_id: Option<String>,
}

impl Validate for NovoColaborador {
    /// The CPF must be valid and is sent as plain digits.
    fn validate(mut self) -> Result<Self, AdapterError> {
        self.cpf = ids::validate_cpf(&self.cpf).map_err(|source| AdapterError::Validation {
            field: "cpf",
            source,
        })?;
        Ok(self)
    }
}

/// A stock item, one PPE type held in a warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemEstoque {
    pub id: String,
    pub nome: String,
    /// Certificado de Aprovação number.
    #[serde(default)]
    pub numero_ca: Option<String>,
    #[serde(default)]
    pub categoria: Option<String>,
    pub quantidade: i64,
    #[serde(default)]
    pub estoque_minimo: Option<i64>,
    #[serde(default)]
    pub almoxarifado_id: Option<String>,
}

impl ItemEstoque {
    /// Whether the quantity is at or below the configured minimum.
    pub fn abaixo_do_minimo(&self) -> bool {
        self.estoque_minimo
            .is_some_and(|minimo| self.quantidade <= minimo)
    }
}

/// Payload to create or replace an [`ItemEstoque`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NovoItemEstoque {
    pub nome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numero_ca: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categoria: Option<String>,
    pub quantidade: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estoque_minimo: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub almoxarifado_id: Option<String>,
}

impl Validate for NovoItemEstoque {}

/// The kind of a stock ledger (kardex) movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TipoMovimentacao {
    Entrada,
    Saida,
    Ajuste,
    Devolucao,
}

/// One line of the stock ledger (kardex).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovimentacaoEstoque {
    pub id: String,
    pub item_estoque_id: String,
    pub tipo: TipoMovimentacao,
    pub quantidade: i64,
    #[serde(default)]
    pub saldo_apos: Option<i64>,
    pub data: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusEntrega {
    PendenteAssinatura,
    Assinada,
    Devolvida,
    Cancelada,
}

/// A delivered line of an [`Entrega`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemEntrega {
    pub item_estoque_id: String,
    pub quantidade: u32,
    #[serde(default)]
    pub quantidade_devolvida: u32,
}

impl ItemEntrega {
    /// How many units are still with the employee.
    pub fn pendente_devolucao(&self) -> u32 {
        self.quantidade.saturating_sub(self.quantidade_devolvida)
    }
}

/// A delivery of PPE to an employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entrega {
    pub id: String,
    pub colaborador_id: String,
    #[serde(default)]
    pub ficha_epi_id: Option<String>,
    pub data_entrega: chrono::DateTime<chrono::Utc>,
    pub status: StatusEntrega,
    #[serde(default)]
    pub itens: Vec<ItemEntrega>,
}

/// Payload to register an [`Entrega`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NovaEntrega {
    pub colaborador_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ficha_epi_id: Option<String>,
    pub itens: Vec<ItemEntrega>,
}

impl Validate for NovaEntrega {
    fn validate(self) -> Result<Self, AdapterError> {
        if self.itens.is_empty() || self.itens.iter().any(|item| item.quantidade == 0) {
            return Err(AdapterError::InvalidPayload(
                "an entrega needs at least one item with a positive quantity".to_string(),
            ));
        }
        Ok(self)
    }
}

/// A returned line, sent when registering a devolução.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevolucaoItem {
    pub item_estoque_id: String,
    pub quantidade: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motivo: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusFicha {
    Ativa,
    Inativa,
    Suspensa,
}

/// An employee's PPE sheet, grouping their deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FichaEpi {
    pub id: String,
    pub colaborador_id: String,
    pub status: StatusFicha,
    #[serde(default)]
    pub criada_em: Option<chrono::DateTime<chrono::Utc>>,
}

/// Payload to open a [`FichaEpi`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NovaFichaEpi {
    pub colaborador_id: String,
}

impl Validate for NovaFichaEpi {}

/// A key/value system setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuracao {
    pub chave: String,
    pub valor: serde_json::Value,
    #[serde(default)]
    pub descricao: Option<String>,
}
