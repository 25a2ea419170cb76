//! In-memory [`GeneApi`] and [`VariantApi`] for tests.

use crate::api::{GeneApi, OutputFormat, VariantApi, VariantOutput, VariantRequest};
use crate::ApiError;

use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct FakeGeneApi {
    pub details: BTreeMap<String, Value>,
    pub symbols: Vec<String>,
    pub hgnc_ids: Vec<String>,
    /// Number of upcoming calls that fail with a 503.
    pub failures: Cell<u32>,
    pub calls: Cell<u32>,
}

impl FakeGeneApi {
    pub fn new() -> Self {
        FakeGeneApi {
            details: BTreeMap::from([
                ("NPHS1".to_string(), json!({"symbol": "NPHS1", "NCS": 0.8})),
                ("PCSK9".to_string(), json!({"symbol": "PCSK9", "NCS": 0.6})),
            ]),
            symbols: vec!["NPHS1".to_string(), "PCSK9".to_string()],
            hgnc_ids: vec!["7908".to_string(), "20001".to_string()],
            ..Default::default()
        }
    }

    fn call(&self, url: &str) -> Result<(), ApiError> {
        self.calls.set(self.calls.get() + 1);
        if self.failures.get() > 0 {
            self.failures.set(self.failures.get() - 1);
            return Err(ApiError::status(503, url));
        }
        Ok(())
    }
}

impl GeneApi for FakeGeneApi {
    async fn symbols_index(&self) -> Result<Vec<String>, ApiError> {
        self.call("symbols.json")?;
        Ok(self.symbols.clone())
    }

    async fn hgnc_index(&self) -> Result<Vec<String>, ApiError> {
        self.call("hgnc_ids.json")?;
        Ok(self.hgnc_ids.clone())
    }

    async fn gene_details(&self, symbol: &str) -> Result<Value, ApiError> {
        let url = format!("genes/{symbol}.json");
        self.call(&url)?;
        self.details.get(symbol).cloned().ok_or_else(|| ApiError::status(404, url))
    }

    async fn gene_scores(&self) -> Result<Value, ApiError> {
        self.call("gene_scores.json")?;
        Ok(json!(self.details.values().collect::<Vec<_>>()))
    }
}

#[derive(Debug, Default)]
pub struct FakeVariantApi {
    pub requests: RefCell<Vec<VariantRequest>>,
}

impl VariantApi for FakeVariantApi {
    async fn analyze(&self, request: &VariantRequest) -> Result<VariantOutput, ApiError> {
        self.requests.borrow_mut().push(request.clone());
        let annotation = json!({
            "input": "1 55051215 . G GA . . .",
            "nephro_variant_score": 0.5,
            "transcript_consequences": [
                {"transcript_id": "ENST00000302118", "gene_symbol": "PCSK9", "impact": "HIGH", "mane": ["MANE_Select"]},
            ]
        });
        let output = match request.options.output {
            OutputFormat::Json => VariantOutput::Json(json!({"annotationData": [annotation]})),
            _ => VariantOutput::Text("input,gene_symbol\n1 55051215 . G GA . . .,PCSK9\n".to_string()),
        };
        Ok(output)
    }
}
