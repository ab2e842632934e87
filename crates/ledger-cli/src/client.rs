use anyhow::{bail, Context, Result};
use ledger_core::wire::{
    BalanceResponse, ChainResponse, MessageResponse, MineRequest, MineResponse, TransactionRequest,
};
use ledger_core::Block;
use reqwest::{Client, StatusCode};
use serde_json::Number;
use std::time::Duration;

use crate::miner::{Authority, SubmitOutcome};

/// HTTP client for a running ledger-node.
#[derive(Clone, Debug)]
pub struct NodeClient {
    http: Client,
    base: String,
}

impl NodeClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("building http client")?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    pub async fn last_block(&self) -> Result<Block> {
        let res = self.http.get(self.url("/last_block")).send().await?;
        let res = res.error_for_status()?;
        res.json::<Block>()
            .await
            .context("decoding /last_block response")
    }

    pub async fn chain(&self) -> Result<ChainResponse> {
        let res = self.http.get(self.url("/chain")).send().await?;
        Ok(res.error_for_status()?.json().await?)
    }

    pub async fn balance(&self, id: &str) -> Result<BalanceResponse> {
        let path = format!("/balance/{}", urlencoding::encode(id));
        let res = self.http.get(self.url(&path)).send().await?;
        Ok(res.error_for_status()?.json().await?)
    }

    /// Queue a transaction; returns the node's status and message.
    pub async fn submit_transaction(
        &self,
        sender: &str,
        recipient: &str,
        amount: Number,
    ) -> Result<(StatusCode, String)> {
        let body = TransactionRequest {
            sender: Some(sender.to_string()),
            recipient: Some(recipient.to_string()),
            amount: Some(amount),
        };
        let res = self
            .http
            .post(self.url("/transactions/new"))
            .json(&body)
            .send()
            .await?;
        let status = res.status();
        let message: MessageResponse = res.json().await.context("decoding node reply")?;
        Ok((status, message.message))
    }

    pub async fn submit_proof(&self, miner_id: &str, proof: u64) -> Result<SubmitOutcome> {
        let body = MineRequest {
            id: Some(miner_id.to_string()),
            proof: Some(proof),
        };
        let res = self.http.post(self.url("/mine")).json(&body).send().await?;
        match res.status() {
            StatusCode::CREATED => Ok(SubmitOutcome::Accepted(
                res.json::<MineResponse>()
                    .await
                    .context("decoding /mine response")?,
            )),
            StatusCode::BAD_REQUEST => {
                let reply: MessageResponse =
                    res.json().await.context("decoding /mine rejection")?;
                Ok(SubmitOutcome::Rejected(reply.message))
            }
            other => bail!("unexpected status {other} from /mine"),
        }
    }
}

impl Authority for NodeClient {
    async fn last_block(&self) -> Result<Block> {
        NodeClient::last_block(self).await
    }

    async fn submit_proof(&self, miner_id: &str, proof: u64) -> Result<SubmitOutcome> {
        NodeClient::submit_proof(self, miner_id, proof).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::{MinerAgent, MinerConfig};
    use ledger_core::{AuthorityConfig, ChainStore, MemoryStore};
    use ledger_node::{router, AppState};
    use std::sync::Arc;

    async fn spawn_node(difficulty: u32) -> (String, AppState) {
        let store: Arc<dyn ChainStore> = Arc::new(MemoryStore::new());
        let config = AuthorityConfig {
            difficulty,
            ..AuthorityConfig::default()
        };
        let state = AppState::from_store(store, config).unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), state)
    }

    #[tokio::test]
    async fn miner_mines_against_a_live_node() {
        let (base, state) = spawn_node(2).await;
        let client = NodeClient::new(&base, Duration::from_secs(5)).unwrap();

        let (status, message) = client.submit_transaction("a", "b", 5.into()).await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(message, "Transaction will be added to Block 2");

        let agent = MinerAgent::new(
            client.clone(),
            MinerConfig {
                miner_id: "miner 1".into(),
                difficulty: 2,
                parallel: false,
                retry_delay: Duration::from_millis(1),
                max_retry_delay: Duration::from_millis(4),
                max_rounds: Some(2),
            },
        );
        let report = agent.run().await;
        assert_eq!(report.coins, 2);

        let chain = client.chain().await.unwrap();
        assert_eq!(chain.length, 3);
        assert_eq!(chain.chain, state.authority().blocks());
        assert_eq!(chain.chain[1].transactions.len(), 2);
        assert_eq!(client.balance("miner 1").await.unwrap().balance, Number::from(2));
        assert_eq!(client.balance("b").await.unwrap().balance, Number::from(5));

        let fractional = Number::from_f64(0.5).unwrap();
        let (status, _) = client.submit_transaction("b", "c", fractional).await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn bad_proof_comes_back_rejected() {
        let (base, _state) = spawn_node(8).await;
        let client = NodeClient::new(&base, Duration::from_secs(5)).unwrap();
        match client.submit_proof("m", 0).await.unwrap() {
            SubmitOutcome::Rejected(message) => assert_eq!(message, "Unable to forge block!"),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_node_is_an_error() {
        let client = NodeClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert!(client.last_block().await.is_err());
    }
}
