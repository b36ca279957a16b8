mod contract_key;

pub use contract_key::{extract_contract_keys, ContractKey, CONTRACT_KEY_PREFIX};
