use std::fmt;
use std::str::FromStr;

use ibc_proto::cosmos::base::v1beta1::Coin as ProtoCoin;
use ibc_proto::cosmos::tx::v1beta1::Fee;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::config::{ClientConfig, ConfigError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coin {
    pub denom: String,
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    fn to_proto(&self) -> ProtoCoin {
        ProtoCoin {
            denom: self.denom.clone(),
            amount: self.amount.to_string(),
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// 形如 `0.025uatom` 的 gas 单价。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasPrice {
    amount: Decimal,
    denom: String,
}

impl GasPrice {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        let split = raw
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("`{raw}` 缺少 denom"))?;
        let (number, denom) = raw.split_at(split);
        if !number.chars().any(|c| c.is_ascii_digit()) {
            return Err(format!("`{raw}` 缺少数量"));
        }
        if !denom
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '_' | '-'))
        {
            return Err(format!("`{denom}` 不是合法的 denom"));
        }

        let amount =
            Decimal::from_str(number).map_err(|err| format!("`{number}` 解析失败: {err}"))?;
        Ok(Self {
            amount,
            denom: denom.to_string(),
        })
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn denom(&self) -> &str {
        &self.denom
    }

    /// `gas * price`，向上取整；溢出时返回 `None`。
    pub fn fee_for(&self, gas: u64) -> Option<u128> {
        Decimal::from(gas)
            .checked_mul(self.amount)?
            .ceil()
            .to_u128()
    }
}

impl fmt::Display for GasPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount.normalize(), self.denom)
    }
}

/// 交易手续费与 gas 上限。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeParams {
    pub amount: Vec<Coin>,
    pub gas_limit: u64,
    pub payer: String,
    pub granter: String,
}

impl FeeParams {
    pub fn new(amount: Vec<Coin>, gas_limit: u64) -> Self {
        Self {
            amount,
            gas_limit,
            payer: String::new(),
            granter: String::new(),
        }
    }

    pub fn from_gas_price(price: &GasPrice, gas_limit: u64) -> Option<Self> {
        let amount = price.fee_for(gas_limit)?;
        Some(Self::new(vec![Coin::new(price.denom(), amount)], gas_limit))
    }

    /// 按配置推导手续费：有 gas 估算值时乘以 `gas_adjustment` 并向上取整，否则使用默认 gas 上限；
    /// 结果不低于 `min_gas_amount`。
    pub fn from_config(
        config: &ClientConfig,
        estimated_gas: Option<u64>,
    ) -> Result<Self, ConfigError> {
        let price = config.gas_price()?;
        let gas_limit = match estimated_gas {
            Some(estimate) => Decimal::from(estimate)
                .checked_mul(config.gas_adjustment)
                .and_then(|adjusted| adjusted.ceil().to_u64())
                .ok_or_else(|| {
                    ConfigError::invalid(
                        "gas_adjustment",
                        format!("{estimate} * {} 超出 gas 上限范围", config.gas_adjustment),
                    )
                })?,
            None => config.default_gas_limit,
        };
        let gas_limit = gas_limit.max(config.min_gas_amount);
        Self::from_gas_price(&price, gas_limit).ok_or_else(|| {
            ConfigError::invalid("gas_prices", format!("{gas_limit} * {price} 超出手续费范围"))
        })
    }

    pub fn with_granter(mut self, granter: impl Into<String>) -> Self {
        self.granter = granter.into();
        self
    }

    pub fn with_payer(mut self, payer: impl Into<String>) -> Self {
        self.payer = payer.into();
        self
    }

    pub fn to_proto(&self) -> Fee {
        Fee {
            amount: self.amount.iter().map(Coin::to_proto).collect(),
            gas_limit: self.gas_limit,
            payer: self.payer.clone(),
            granter: self.granter.clone(),
        }
    }
}
