//! Programmable transaction building and the BCS layout the node expects.
//!
//! Coordinators describe a transaction with [`TransactionBuilder`], naming
//! objects only by id. The gateway resolves those ids to owned or shared
//! references, attaches gas and produces the signed [`TransactionData`].

use std::fmt;

use serde::Serialize;

use crate::errors::Error;
use crate::types::{ObjectId, ObjectRef, SuiAddress};
use crate::Result;

/// A value flowing between commands of one programmable transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Argument {
    GasCoin,
    Input(u16),
    Result(u16),
    NestedResult(u16, u16),
}

impl Argument {
    /// The `index`-th value of a command that returns several.
    pub fn nested(self, index: u16) -> Result<Self> {
        match self {
            Self::Result(command) => Ok(Self::NestedResult(command, index)),
            other => Err(Error::Validation(format!(
                "only command results can be indexed, got {other:?}"
            ))),
        }
    }
}

/// Move type arguments. Nothing in the farming flow is generic, but the
/// variant order is part of the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TypeTag {
    Bool,
    U8,
    U64,
    U128,
    Address,
}

/// `package::module::function`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveTarget {
    pub package: ObjectId,
    pub module: String,
    pub function: String,
}

impl MoveTarget {
    pub fn new(package: ObjectId, module: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            package,
            module: module.into(),
            function: function.into(),
        }
    }
}

impl fmt::Display for MoveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.package, self.module, self.function)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgrammableMoveCall {
    pub package: ObjectId,
    pub module: String,
    pub function: String,
    pub type_arguments: Vec<TypeTag>,
    pub arguments: Vec<Argument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Command {
    MoveCall(Box<ProgrammableMoveCall>),
    TransferObjects(Vec<Argument>, Argument),
    SplitCoins(Argument, Vec<Argument>),
    MergeCoins(Argument, Vec<Argument>),
}

/// A transaction input before the gateway has looked up object ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedInput {
    Object(ObjectId),
    Pure(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ObjectArg {
    ImmOrOwnedObject(ObjectRef),
    SharedObject {
        id: ObjectId,
        initial_shared_version: u64,
        mutable: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CallArg {
    Pure(Vec<u8>),
    Object(ObjectArg),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgrammableTransaction {
    pub inputs: Vec<CallArg>,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TransactionKind {
    ProgrammableTransaction(ProgrammableTransaction),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GasData {
    pub payment: Vec<ObjectRef>,
    pub owner: SuiAddress,
    pub price: u64,
    pub budget: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TransactionExpiration {
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionDataV1 {
    pub kind: TransactionKind,
    pub sender: SuiAddress,
    pub gas_data: GasData,
    pub expiration: TransactionExpiration,
}

/// Versioned envelope signed by the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TransactionData {
    V1(TransactionDataV1),
}

impl TransactionData {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bcs::to_bytes(self)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionBuilder {
    sender: Option<SuiAddress>,
    inputs: Vec<UnresolvedInput>,
    commands: Vec<Command>,
}

impl TransactionBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_sender(&mut self, sender: SuiAddress) -> &mut Self {
        self.sender = Some(sender);
        self
    }

    #[must_use]
    pub fn sender(&self) -> Option<SuiAddress> {
        self.sender
    }

    #[must_use]
    pub fn gas(&self) -> Argument {
        Argument::GasCoin
    }

    /// References an object by id. The same id always maps to one input.
    pub fn object(&mut self, id: ObjectId) -> Result<Argument> {
        let existing = self
            .inputs
            .iter()
            .position(|input| matches!(input, UnresolvedInput::Object(o) if *o == id));
        match existing {
            Some(index) => Ok(Argument::Input(input_index(index)?)),
            None => self.push_input(UnresolvedInput::Object(id)),
        }
    }

    /// A BCS-encoded plain value such as an amount or an address.
    pub fn pure<T: Serialize>(&mut self, value: &T) -> Result<Argument> {
        let bytes = bcs::to_bytes(value)?;
        self.push_input(UnresolvedInput::Pure(bytes))
    }

    pub fn move_call(&mut self, target: MoveTarget, arguments: Vec<Argument>) -> Result<Argument> {
        self.push_command(Command::MoveCall(Box::new(ProgrammableMoveCall {
            package: target.package,
            module: target.module,
            function: target.function,
            type_arguments: Vec::new(),
            arguments,
        })))
    }

    /// Splits `coin` into one new coin per amount; index the result with
    /// [`Argument::nested`].
    pub fn split_coins(&mut self, coin: Argument, amounts: Vec<Argument>) -> Result<Argument> {
        self.push_command(Command::SplitCoins(coin, amounts))
    }

    pub fn merge_coins(&mut self, destination: Argument, sources: Vec<Argument>) -> Result<Argument> {
        self.push_command(Command::MergeCoins(destination, sources))
    }

    pub fn transfer_objects(&mut self, objects: Vec<Argument>, recipient: Argument) -> Result<Argument> {
        self.push_command(Command::TransferObjects(objects, recipient))
    }

    #[must_use]
    pub fn inputs(&self) -> &[UnresolvedInput] {
        &self.inputs
    }

    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Names of the Move functions called, in order.
    pub fn move_calls(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|command| match command {
            Command::MoveCall(call) => Some(call.function.as_str()),
            _ => None,
        })
    }

    /// Object ids referenced as inputs, in input order.
    pub fn object_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.inputs.iter().filter_map(|input| match input {
            UnresolvedInput::Object(id) => Some(*id),
            UnresolvedInput::Pure(_) => None,
        })
    }

    /// Completes the transaction with resolved inputs and gas.
    ///
    /// `resolve` maps every object id to its [`ObjectArg`]; it is called once
    /// per object input, in input order.
    pub fn finish<F>(&self, gas_data: GasData, mut resolve: F) -> Result<TransactionData>
    where
        F: FnMut(ObjectId) -> Result<ObjectArg>,
    {
        let sender = self
            .sender
            .ok_or_else(|| Error::Validation("transaction has no sender".to_owned()))?;
        if self.commands.is_empty() {
            return Err(Error::Validation("transaction has no commands".to_owned()));
        }

        let inputs = self
            .inputs
            .iter()
            .map(|input| match input {
                UnresolvedInput::Object(id) => resolve(*id).map(CallArg::Object),
                UnresolvedInput::Pure(bytes) => Ok(CallArg::Pure(bytes.clone())),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TransactionData::V1(TransactionDataV1 {
            kind: TransactionKind::ProgrammableTransaction(ProgrammableTransaction {
                inputs,
                commands: self.commands.clone(),
            }),
            sender,
            gas_data,
            expiration: TransactionExpiration::None,
        }))
    }

    fn push_input(&mut self, input: UnresolvedInput) -> Result<Argument> {
        let index = input_index(self.inputs.len())?;
        self.inputs.push(input);
        Ok(Argument::Input(index))
    }

    fn push_command(&mut self, command: Command) -> Result<Argument> {
        let index = input_index(self.commands.len())?;
        self.commands.push(command);
        Ok(Argument::Result(index))
    }
}

fn input_index(index: usize) -> Result<u16> {
    u16::try_from(index)
        .map_err(|_| Error::Validation(format!("transaction exceeds {} entries", u16::MAX)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectDigest;

    fn id(last: u8) -> ObjectId {
        let mut bytes = [0; 32];
        bytes[31] = last;
        ObjectId::new(bytes)
    }

    #[test]
    fn arguments_use_sui_variant_indices() {
        assert_eq!(bcs::to_bytes(&Argument::GasCoin).unwrap(), vec![0]);
        assert_eq!(bcs::to_bytes(&Argument::Input(1)).unwrap(), vec![1, 1, 0]);
        assert_eq!(bcs::to_bytes(&Argument::Result(2)).unwrap(), vec![2, 2, 0]);
        assert_eq!(
            bcs::to_bytes(&Argument::NestedResult(1, 2)).unwrap(),
            vec![3, 1, 0, 2, 0]
        );
    }

    #[test]
    fn same_object_is_one_input() {
        let mut tx = TransactionBuilder::new();
        let first = tx.object(id(7)).unwrap();
        let amount = tx.pure(&5_u64).unwrap();
        let again = tx.object(id(7)).unwrap();

        assert_eq!(first, Argument::Input(0));
        assert_eq!(amount, Argument::Input(1));
        assert_eq!(again, Argument::Input(0));
        assert_eq!(tx.inputs().len(), 2);
    }

    #[test]
    fn only_results_can_be_nested() {
        assert_eq!(
            Argument::Result(3).nested(1).unwrap(),
            Argument::NestedResult(3, 1)
        );
        assert!(Argument::GasCoin.nested(0).is_err());
    }

    #[test]
    fn finish_requires_sender_and_commands() {
        let gas = GasData {
            payment: Vec::new(),
            owner: SuiAddress::default(),
            price: 1,
            budget: 1,
        };
        let mut tx = TransactionBuilder::new();
        assert!(tx.finish(gas.clone(), |_| unreachable!()).is_err());

        tx.set_sender(SuiAddress::default());
        assert!(tx.finish(gas, |_| unreachable!()).is_err());
    }

    #[test]
    fn finished_transaction_encodes_resolved_inputs() {
        let mut tx = TransactionBuilder::new();
        tx.set_sender(SuiAddress::new([9; 32]));
        let shared = tx.object(id(1)).unwrap();
        let owned = tx.object(id(2)).unwrap();
        tx.move_call(MoveTarget::new(id(3), "spam", "register_user_counter"), vec![shared, owned])
            .unwrap();

        let owned_ref = ObjectRef {
            object_id: id(2),
            version: 11,
            digest: ObjectDigest::new([4; 32]),
        };
        let gas = GasData {
            payment: vec![owned_ref],
            owner: SuiAddress::new([9; 32]),
            price: 750,
            budget: 10_000_000,
        };

        let data = tx
            .finish(gas, |object| {
                Ok(if object == id(1) {
                    ObjectArg::SharedObject {
                        id: object,
                        initial_shared_version: 5,
                        mutable: true,
                    }
                } else {
                    ObjectArg::ImmOrOwnedObject(owned_ref)
                })
            })
            .unwrap();

        let bytes = data.to_bytes().unwrap();
        // V1, ProgrammableTransaction, two inputs, first is Object(SharedObject).
        assert_eq!(&bytes[..5], &[0, 0, 2, 1, 1]);

        let TransactionData::V1(v1) = data;
        let TransactionKind::ProgrammableTransaction(ptb) = v1.kind;
        assert!(matches!(ptb.inputs[1], CallArg::Object(ObjectArg::ImmOrOwnedObject(_))));
        assert_eq!(ptb.commands.len(), 1);
    }

    #[test]
    fn move_calls_lists_functions_in_order() {
        let mut tx = TransactionBuilder::new();
        let director = tx.object(id(1)).unwrap();
        tx.move_call(MoveTarget::new(id(3), "spam", "register_user_counter"), vec![director])
            .unwrap();
        tx.move_call(MoveTarget::new(id(3), "spam", "new_user_counter"), vec![director])
            .unwrap();
        let gas = tx.gas();
        tx.split_coins(gas, vec![]).unwrap();

        let calls: Vec<_> = tx.move_calls().collect();
        assert_eq!(calls, ["register_user_counter", "new_user_counter"]);
    }
}
