use crate::{
    BalanceAtHeight, BalanceService, EligibilityContract, FungibleTokenContract, LatestSnapshot,
    SnapshotResponse,
};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum Error {
    #[error("snapshot service request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unknown snapshot error, status code: {status} ({url})")]
    Status { status: StatusCode, url: String },
}

impl Error {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Request(e) => e.status(),
            Self::Status { status, .. } => Some(*status),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request(e) if e.is_timeout())
    }
}

/// Blocking client of the balance snapshot service.
pub struct SnapshotClient {
    base_url: String,
    client: Client,
}

impl SnapshotClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, Error> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the service to snapshot balances of `contract` at the current height
    pub fn take_snapshot(&self, contract: &EligibilityContract) -> Result<SnapshotResponse, Error> {
        let url = self.contract_url("take-snapshot", contract);
        info!(%url, "taking token snapshot");
        self.send(self.client.post(url))
    }

    pub fn status_at_height(
        &self,
        contract: &EligibilityContract,
        block_height: u64,
    ) -> Result<SnapshotResponse, Error> {
        let url = self.contract_url(&format!("status-at-blockheight/{}", block_height), contract);
        self.send(self.client.get(url))
    }

    pub fn latest_block_height(&self) -> Result<LatestSnapshot, Error> {
        let url = format!("{}/latest-blockheight", self.base_url);
        self.send(self.client.get(url))
    }

    /// Register a fungible token with the service so that its balances are
    /// indexed from now on. Registering a token twice is not an error.
    pub fn add_fungible_token(&self, contract: &EligibilityContract) -> Result<(), Error> {
        #[derive(Deserialize)]
        struct Registered {
            #[allow(dead_code)]
            data: String,
        }

        let url = format!("{}/add-fungible-token", self.base_url);
        let payload = FungibleTokenContract {
            contract_address: contract.addr.clone(),
            contract_name: contract.name.clone(),
            public_capability_path: contract.public_path.clone(),
        };

        match self.send::<Registered>(self.client.post(url).json(&payload)) {
            Ok(_) => Ok(()),
            // the service answers 400 when the token is already registered
            Err(e) if e.status() == Some(StatusCode::BAD_REQUEST) => {
                debug!(token = %contract.name, "fungible token already registered");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn contract_url(&self, route: &str, contract: &EligibilityContract) -> String {
        if contract.is_native_token() {
            format!("{}/{}", self.base_url, route)
        } else {
            format!(
                "{}/{}/{}/{}",
                self.base_url, route, contract.addr, contract.name
            )
        }
    }

    fn balance_url(&self, address: &str, block_height: u64, contract: &EligibilityContract) -> String {
        self.contract_url(
            &format!("balance-at-blockheight/{}/{}", address, block_height),
            contract,
        )
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, Error> {
        let response = request
            .header(CONTENT_TYPE, "application/json; charset=UTF-8")
            .send()?;
        let status = response.status();
        if !status.is_success() {
            let url = response.url().to_string();
            debug!(%url, %status, "snapshot service error");
            return Err(Error::Status { status, url });
        }
        Ok(response.json()?)
    }
}

impl BalanceService for SnapshotClient {
    fn balance_at_height(
        &self,
        address: &str,
        block_height: u64,
        contract: &EligibilityContract,
    ) -> Result<BalanceAtHeight, Error> {
        let url = self.balance_url(address, block_height, contract);
        let balance: BalanceAtHeight = self.send(self.client.get(url))?;
        info!(address, block_height, ?balance, "got balance from snapshot service");
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AssetKind;
    use httpmock::{
        Method::{GET, POST},
        MockServer,
    };
    use serde_json::json;

    fn contract(name: &str, addr: &str) -> EligibilityContract {
        EligibilityContract {
            kind: AssetKind::Fungible,
            name: name.to_string(),
            addr: addr.to_string(),
            public_path: "exampleBalance".to_string(),
            threshold: None,
            max_weight: None,
            event_id: None,
        }
    }

    #[test]
    fn native_token_balance_has_no_contract_suffix() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/balance-at-blockheight/0xf8d6e0586b0a20c7/42");
            then.status(200).json_body(json!({
                "primaryAccountBalance": 250000000u64,
                "secondaryAccountBalance": 0,
                "stakingBalance": 100000000u64,
                "blockHeight": 42
            }));
        });

        let client = SnapshotClient::new(server.base_url()).unwrap();
        let balance = client
            .balance_at_height("0xf8d6e0586b0a20c7", 42, &contract("FlowToken", "0x0ae53cb6e3f42a79"))
            .unwrap();

        mock.assert();
        assert_eq!(balance.primary_account_balance, 250000000);
        assert_eq!(balance.staking_balance, 100000000);
        assert_eq!(balance.block_height, 42);
    }

    #[test]
    fn custom_token_balance_has_contract_suffix() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/balance-at-blockheight/0x01/7/0x02/ExampleToken");
            then.status(200)
                .json_body(json!({"primaryAccountBalance": 1, "blockHeight": 7}));
        });

        let client = SnapshotClient::new(format!("{}/", server.base_url())).unwrap();
        let balance = client
            .balance_at_height("0x01", 7, &contract("ExampleToken", "0x02"))
            .unwrap();

        mock.assert();
        assert_eq!(balance.primary_account_balance, 1);
        assert_eq!(balance.secondary_account_balance, 0);
    }

    #[test]
    fn non_success_status_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/latest-blockheight");
            then.status(503);
        });

        let client = SnapshotClient::new(server.base_url()).unwrap();
        let err = client.latest_block_height().unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!err.is_timeout());
    }

    #[test]
    fn take_snapshot_and_status() {
        let server = MockServer::start();
        let take = server.mock(|when, then| {
            when.method(POST).path("/take-snapshot/0x02/ExampleToken");
            then.status(200).json_body(json!({
                "data": {"message": "", "status": "pending", "blockHeight": 1000}
            }));
        });
        let status = server.mock(|when, then| {
            when.method(GET)
                .path("/status-at-blockheight/1000/0x02/ExampleToken");
            then.status(200).json_body(json!({
                "data": {"message": "", "status": "success", "blockHeight": 1000}
            }));
        });

        let client = SnapshotClient::new(server.base_url()).unwrap();
        let contract = contract("ExampleToken", "0x02");
        let taken = client.take_snapshot(&contract).unwrap();
        assert_eq!(taken.data.block_height, 1000);
        let done = client.status_at_height(&contract, 1000).unwrap();
        assert!(done.data.is_success());

        take.assert();
        status.assert();
    }

    #[test]
    fn add_already_registered_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/add-fungible-token").json_body(json!({
                "contractAddress": "0x02",
                "contractName": "ExampleToken",
                "publicCapabilityPath": "exampleBalance"
            }));
            then.status(400);
        });

        let client = SnapshotClient::new(server.base_url()).unwrap();
        client
            .add_fungible_token(&contract("ExampleToken", "0x02"))
            .unwrap();
        mock.assert();
    }

    #[test]
    fn add_token_server_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/add-fungible-token");
            then.status(500);
        });

        let client = SnapshotClient::new(server.base_url()).unwrap();
        assert!(client
            .add_fungible_token(&contract("ExampleToken", "0x02"))
            .is_err());
    }
}
