use crate::{
    abi::{
        self,
        entrypoints,
    },
    felt::Felt,
    transport::{
        ContractTransport,
        FunctionCall,
        is_contract_revert,
    },
    types::{
        CurrentRoundInfo,
        LotteryInfo,
        RoundId,
        RoundInfo,
        Statistics,
        UserTicket,
        unix_now,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use primitive_types::U256;
use tracing::debug;

/// Typed read access to the lottery contract. Stateless apart from the
/// transport handle, so one gateway can serve every view.
#[derive(Clone)]
pub struct LotteryGateway<T> {
    transport: T,
    contract: Felt,
}

impl<T: ContractTransport> LotteryGateway<T> {
    pub fn new(transport: T, contract: Felt) -> Self {
        Self {
            transport,
            contract,
        }
    }

    pub fn contract_address(&self) -> Felt {
        self.contract
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn call(
        &self,
        entrypoint: &'static str,
        calldata: Vec<Felt>,
    ) -> Result<serde_json::Value> {
        let call = FunctionCall::new(self.contract, entrypoint, calldata);
        self.transport.call(&call).await
    }

    pub async fn get_info(&self) -> Result<LotteryInfo> {
        let value = self.call(entrypoints::GET_INFO, Vec::new()).await?;
        abi::decode_info(value).wrap_err("invalid get_info result")
    }

    pub async fn get_current_round_info(&self) -> Result<CurrentRoundInfo> {
        let value = self
            .call(entrypoints::GET_CURRENT_ROUND_INFO, Vec::new())
            .await?;
        abi::decode_current_round(value, unix_now())
            .wrap_err("invalid get_current_round_info result")
    }

    /// `None` when the contract answers with a different id, which is how it
    /// reports rounds that do not exist yet.
    pub async fn get_round_info(&self, round_id: RoundId) -> Result<Option<RoundInfo>> {
        let value = self
            .call(entrypoints::GET_ROUND_INFO, vec![Felt::from(round_id)])
            .await?;
        let round = abi::decode_round(value)
            .wrap_err_with(|| format!("invalid get_round_info result for {round_id}"))?;
        if round.id != round_id {
            debug!(requested = round_id, returned = round.id, "round id mismatch");
            return Ok(None);
        }
        Ok(Some(round))
    }

    /// Batch variant; results keep the order of `round_ids`.
    pub async fn get_rounds_info(&self, round_ids: &[RoundId]) -> Result<Vec<RoundInfo>> {
        if round_ids.is_empty() {
            return Ok(Vec::new());
        }
        let value = self
            .call(entrypoints::GET_ROUNDS_INFO, abi::encode_round_ids(round_ids))
            .await?;
        abi::decode_rounds(value).wrap_err("invalid get_rounds_info result")
    }

    /// `None` when the user holds no ticket for the round. Only RPC or
    /// decoding failures are errors.
    pub async fn get_user_ticket(
        &self,
        user: Felt,
        round_id: RoundId,
    ) -> Result<Option<UserTicket>> {
        let value = self
            .call(
                entrypoints::GET_USER_TICKET,
                vec![user, Felt::from(round_id)],
            )
            .await?;
        abi::decode_ticket(round_id, value)
            .wrap_err_with(|| format!("invalid get_user_ticket result for {round_id}"))
    }

    pub async fn get_user_reward(&self, user: Felt, round_id: RoundId) -> Result<U256> {
        let value = self
            .call(
                entrypoints::GET_USER_REWARD,
                vec![user, Felt::from(round_id)],
            )
            .await?;
        abi::decode_u256(value).wrap_err("invalid get_user_reward result")
    }

    /// `None` while the round is not drawn; the contract reverts in that case.
    pub async fn get_round_winning_number(&self, round_id: RoundId) -> Result<Option<u8>> {
        match self
            .call(
                entrypoints::GET_ROUND_WINNING_NUMBER,
                vec![Felt::from(round_id)],
            )
            .await
        {
            Ok(value) => abi::decode_u8(value)
                .map(Some)
                .wrap_err("invalid get_round_winning_number result"),
            Err(err) if is_contract_revert(&err) => {
                debug!(round_id, ?err, "winning number not available");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn get_statistics(&self) -> Result<Statistics> {
        let value = self.call(entrypoints::GET_STATISTICS, Vec::new()).await?;
        abi::decode_statistics(value).wrap_err("invalid get_statistics result")
    }
}

/// Read access to the payment token.
#[derive(Clone)]
pub struct Erc20Gateway<T> {
    transport: T,
    token: Felt,
}

impl<T: ContractTransport> Erc20Gateway<T> {
    pub fn new(transport: T, token: Felt) -> Self {
        Self { transport, token }
    }

    pub fn token_address(&self) -> Felt {
        self.token
    }

    pub async fn balance_of(&self, account: Felt) -> Result<U256> {
        let call = FunctionCall::new(self.token, entrypoints::BALANCE_OF, vec![account]);
        let value = self.transport.call(&call).await?;
        abi::decode_u256(value).wrap_err("invalid balance_of result")
    }

    pub async fn allowance(&self, owner: Felt, spender: Felt) -> Result<U256> {
        let call =
            FunctionCall::new(self.token, entrypoints::ALLOWANCE, vec![owner, spender]);
        let value = self.transport.call(&call).await?;
        abi::decode_u256(value).wrap_err("invalid allowance result")
    }
}
