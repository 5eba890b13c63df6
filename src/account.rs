//! The `account_*` namespace of a DREP node.
//!
//! [`ACCOUNT_METHODS`] is the static descriptor table; [`AccountApi`] binds
//! it onto one [`RequestManager`] and exposes one typed function per entry.
//! Arguments and results are opaque JSON values; the node does all wallet
//! and key handling.
//!
//! # Example
//!
//! ```ignore
//! let api = AccountApi::new(client.manager().clone());
//! api.open_wallet("secret")?.await?;
//! let sig = api.sign("0xAddr", "msgHash")?.await?;
//! ```

use serde_json::Value;

use crate::descriptor::MethodDescriptor;
use crate::error::Result;
use crate::facade::Facade;
use crate::manager::RequestManager;
use crate::method::{Call, Method};

/// Wire namespace prefix.
pub const NAMESPACE: &str = "account";

/// `(name, arity)` for every account operation. Wire name is `account_<name>`.
pub const ACCOUNT_METHODS: [(&str, usize); 15] = [
    ("addressList", 0),
    ("call", 5),
    ("closeWallet", 0),
    ("createCode", 3),
    ("createWallet", 1),
    ("dumpPrivkey", 1),
    ("gasPrice", 0),
    ("getCode", 1),
    ("lockWallet", 0),
    ("openWallet", 1),
    ("registerAccount", 4),
    ("sign", 2),
    ("suggestKey", 0),
    ("transfer", 3),
    ("unLockWallet", 1),
];

/// Descriptors for the account namespace, pass-through formatting.
pub fn account_descriptors() -> Vec<MethodDescriptor> {
    ACCOUNT_METHODS
        .iter()
        .map(|&(name, arity)| {
            MethodDescriptor::new(name, format!("{}_{}", NAMESPACE, name), arity)
        })
        .collect()
}

/// Static surface over the account namespace.
#[derive(Clone)]
pub struct AccountApi {
    facade: Facade,
    address_list: Method,
    call: Method,
    close_wallet: Method,
    create_code: Method,
    create_wallet: Method,
    dump_privkey: Method,
    gas_price: Method,
    get_code: Method,
    lock_wallet: Method,
    open_wallet: Method,
    register_account: Method,
    sign: Method,
    suggest_key: Method,
    transfer: Method,
    unlock_wallet: Method,
}

impl AccountApi {
    /// Bind the account table onto `manager`.
    pub fn new(manager: RequestManager) -> Self {
        let facade = match Facade::bind(account_descriptors(), manager) {
            Ok(facade) => facade,
            // names in ACCOUNT_METHODS are unique
            Err(e) => unreachable!("account table is invalid: {}", e),
        };
        let bound = |name: &str| match facade.method(name) {
            Some(method) => method.clone(),
            None => unreachable!("{} is in ACCOUNT_METHODS", name),
        };

        Self {
            address_list: bound("addressList"),
            call: bound("call"),
            close_wallet: bound("closeWallet"),
            create_code: bound("createCode"),
            create_wallet: bound("createWallet"),
            dump_privkey: bound("dumpPrivkey"),
            gas_price: bound("gasPrice"),
            get_code: bound("getCode"),
            lock_wallet: bound("lockWallet"),
            open_wallet: bound("openWallet"),
            register_account: bound("registerAccount"),
            sign: bound("sign"),
            suggest_key: bound("suggestKey"),
            transfer: bound("transfer"),
            unlock_wallet: bound("unLockWallet"),
            facade,
        }
    }

    /// Name-keyed view of the same methods.
    pub fn facade(&self) -> &Facade {
        &self.facade
    }

    /// `account_addressList`: addresses held by the open wallet.
    pub fn address_list(&self) -> Result<Call> {
        self.address_list.call(vec![])
    }

    /// `account_call`: invoke a contract.
    pub fn call_contract(
        &self,
        from: impl Into<Value>,
        to: impl Into<Value>,
        input: impl Into<Value>,
        amount: impl Into<Value>,
        read_only: impl Into<Value>,
    ) -> Result<Call> {
        self.call.call(vec![
            from.into(),
            to.into(),
            input.into(),
            amount.into(),
            read_only.into(),
        ])
    }

    /// `account_closeWallet`
    pub fn close_wallet(&self) -> Result<Call> {
        self.close_wallet.call(vec![])
    }

    /// `account_createCode`: deploy contract byte code.
    pub fn create_code(
        &self,
        from: impl Into<Value>,
        to: impl Into<Value>,
        byte_code: impl Into<Value>,
    ) -> Result<Call> {
        self.create_code.call(vec![from.into(), to.into(), byte_code.into()])
    }

    /// `account_createWallet`: create and open a wallet.
    pub fn create_wallet(&self, password: impl Into<Value>) -> Result<Call> {
        self.create_wallet.call(vec![password.into()])
    }

    /// `account_dumpPrivkey`
    pub fn dump_privkey(&self, address: impl Into<Value>) -> Result<Call> {
        self.dump_privkey.call(vec![address.into()])
    }

    /// `account_gasPrice`
    pub fn gas_price(&self) -> Result<Call> {
        self.gas_price.call(vec![])
    }

    /// `account_getCode`
    pub fn get_code(&self, address: impl Into<Value>) -> Result<Call> {
        self.get_code.call(vec![address.into()])
    }

    /// `account_lockWallet`
    pub fn lock_wallet(&self) -> Result<Call> {
        self.lock_wallet.call(vec![])
    }

    /// `account_openWallet`
    pub fn open_wallet(&self, password: impl Into<Value>) -> Result<Call> {
        self.open_wallet.call(vec![password.into()])
    }

    /// `account_registerAccount`. The four params are passed in node order.
    pub fn register_account(&self, params: [Value; 4]) -> Result<Call> {
        self.register_account.call(params.into())
    }

    /// `account_sign`: sign a message hash with the key for `address`.
    pub fn sign(&self, address: impl Into<Value>, message: impl Into<Value>) -> Result<Call> {
        self.sign.call(vec![address.into(), message.into()])
    }

    /// `account_suggestKey`
    pub fn suggest_key(&self) -> Result<Call> {
        self.suggest_key.call(vec![])
    }

    /// `account_transfer`
    pub fn transfer(
        &self,
        from: impl Into<Value>,
        to: impl Into<Value>,
        amount: impl Into<Value>,
    ) -> Result<Call> {
        self.transfer.call(vec![from.into(), to.into(), amount.into()])
    }

    /// `account_unLockWallet`
    pub fn unlock_wallet(&self, password: impl Into<Value>) -> Result<Call> {
        self.unlock_wallet.call(vec![password.into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_names_unique() {
        let names: HashSet<&str> = ACCOUNT_METHODS.iter().map(|(name, _)| *name).collect();
        assert_eq!(names.len(), ACCOUNT_METHODS.len());
    }

    #[test]
    fn test_descriptor_shape() {
        let descriptors = account_descriptors();
        assert_eq!(descriptors.len(), 15);

        for desc in &descriptors {
            assert_eq!(desc.wire_name(), format!("account_{}", desc.name()));
            assert!(desc.input_formatter(0).is_none());
            assert!(desc.output_formatter().is_none());
        }

        let arity = |name: &str| {
            descriptors
                .iter()
                .find(|d| d.name() == name)
                .map(|d| d.arity())
        };
        assert_eq!(arity("sign"), Some(2));
        assert_eq!(arity("call"), Some(5));
        assert_eq!(arity("registerAccount"), Some(4));
        assert_eq!(arity("unLockWallet"), Some(1));
        assert_eq!(arity("suggestKey"), Some(0));
    }
}
