//! ABI encoding of constructor and call arguments.
//!
//! Plan arguments are loosely typed; each one is coerced against the declared
//! parameter type right before encoding.

use alloy_core::{
    dyn_abi::{DynSolType, DynSolValue},
    json_abi::{Function, Param},
    primitives::Bytes,
};

use crate::{artifacts::Artifact, error::GatewayError, plan::ArgValue, plan::ResourceType};

/// Creation payload: bytecode followed by the encoded constructor arguments.
pub fn encode_constructor(artifact: &Artifact, args: &[ArgValue]) -> Result<Bytes, GatewayError> {
    let inputs = artifact
        .abi
        .constructor
        .as_ref()
        .map(|constructor| constructor.inputs.as_slice())
        .unwrap_or_default();

    if inputs.len() != args.len() {
        return Err(GatewayError::InvalidArguments(format!(
            "constructor of '{}' takes {} argument(s), got {}",
            artifact.contract_name,
            inputs.len(),
            args.len()
        )));
    }

    let mut data = artifact.bytecode.to_vec();
    data.extend(encode_params(inputs, args)?);
    Ok(data.into())
}

/// Find the function a call targets.
///
/// `method` is either a full signature, parsed as-is, or a bare name looked up
/// in the artifact's ABI by name and arity.
pub fn resolve_function(
    artifact: Option<&Artifact>,
    resource_type: &ResourceType,
    method: &str,
    arity: usize,
) -> Result<Function, GatewayError> {
    if method.contains('(') {
        return Function::parse(method).map_err(|e| {
            GatewayError::InvalidArguments(format!("invalid signature '{}': {}", method, e))
        });
    }

    artifact
        .and_then(|artifact| artifact.abi.function(method))
        .and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == arity))
        .cloned()
        .ok_or_else(|| GatewayError::UnknownMethod {
            resource_type: resource_type.clone(),
            method: method.to_string(),
            arity,
        })
}

/// Calldata: selector followed by the encoded arguments.
pub fn encode_call(function: &Function, args: &[ArgValue]) -> Result<Bytes, GatewayError> {
    if function.inputs.len() != args.len() {
        return Err(GatewayError::InvalidArguments(format!(
            "{} takes {} argument(s), got {}",
            function.signature(),
            function.inputs.len(),
            args.len()
        )));
    }

    let mut data = function.selector().to_vec();
    data.extend(encode_params(&function.inputs, args)?);
    Ok(data.into())
}

/// Decode the return data of a read and render each value for display.
pub fn decode_output(function: &Function, data: &[u8]) -> Result<Vec<String>, GatewayError> {
    if function.outputs.is_empty() {
        return Ok(Vec::new());
    }

    let types = param_types(&function.outputs)?;
    let decoded = DynSolType::Tuple(types).abi_decode_params(data).map_err(|e| {
        GatewayError::InvalidArguments(format!(
            "failed to decode output of {}: {}",
            function.signature(),
            e
        ))
    })?;

    match decoded {
        DynSolValue::Tuple(values) => Ok(values.iter().map(format_value).collect()),
        other => Ok(vec![format_value(&other)]),
    }
}

/// Render a decoded value the way an operator expects to read it.
pub fn format_value(value: &DynSolValue) -> String {
    let join = |values: &[DynSolValue]| {
        values
            .iter()
            .map(format_value)
            .collect::<Vec<_>>()
            .join(", ")
    };

    match value {
        DynSolValue::Address(address) => address.to_string(),
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Uint(v, _) => v.to_string(),
        DynSolValue::Int(v, _) => v.to_string(),
        DynSolValue::String(s) => s.clone(),
        DynSolValue::Bytes(bytes) => format!("0x{}", hex::encode(bytes)),
        DynSolValue::FixedBytes(word, size) => format!("0x{}", hex::encode(&word[..*size])),
        DynSolValue::Array(values) | DynSolValue::FixedArray(values) => {
            format!("[{}]", join(values))
        }
        DynSolValue::Tuple(values) => format!("({})", join(values)),
        other => format!("{:?}", other),
    }
}

fn param_types(params: &[Param]) -> Result<Vec<DynSolType>, GatewayError> {
    params
        .iter()
        .map(|param| {
            let ty = param.selector_type();
            DynSolType::parse(&ty).map_err(|e| {
                GatewayError::InvalidArguments(format!("unsupported type '{}': {}", ty, e))
            })
        })
        .collect()
}

fn encode_params(params: &[Param], args: &[ArgValue]) -> Result<Vec<u8>, GatewayError> {
    if params.is_empty() {
        return Ok(Vec::new());
    }

    let values = param_types(params)?
        .iter()
        .zip(args)
        .map(|(ty, arg)| coerce(ty, arg))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DynSolValue::Tuple(values).abi_encode_params())
}

/// Convert a plan argument into a value of type `ty`.
pub fn coerce(ty: &DynSolType, value: &ArgValue) -> Result<DynSolValue, GatewayError> {
    match (ty, value) {
        (DynSolType::Address, ArgValue::Address(address)) => Ok(DynSolValue::Address(*address)),
        (DynSolType::Bool, ArgValue::Bool(b)) => Ok(DynSolValue::Bool(*b)),
        _ => {
            let text = value.to_string();
            ty.coerce_str(&text).map_err(|e| {
                GatewayError::InvalidArguments(format!("cannot use '{}' as {}: {}", text, ty, e))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::{Address, U256};

    use super::*;
    use crate::artifacts::tests::minter_artifact_json;

    fn minter() -> Artifact {
        serde_json::from_str(minter_artifact_json()).unwrap()
    }

    #[test]
    fn test_encode_constructor_appends_arguments_to_bytecode() {
        let token = Address::repeat_byte(0x11);
        let pool = Address::repeat_byte(0x22);

        let data =
            encode_constructor(&minter(), &[ArgValue::Address(token), ArgValue::Address(pool)])
                .unwrap();

        // 5 bytes of bytecode + 2 words.
        assert_eq!(data.len(), 5 + 64);
        assert_eq!(&data[..5], &[0x60, 0x80, 0x60, 0x40, 0x52]);
        assert_eq!(&data[5 + 12..5 + 32], token.as_slice());
        assert_eq!(&data[5 + 32 + 12..], pool.as_slice());
    }

    #[test]
    fn test_encode_constructor_checks_arity() {
        let err = encode_constructor(&minter(), &[]).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidArguments(_)));
    }

    #[test]
    fn test_resolve_function_by_name_and_by_signature() {
        let artifact = minter();
        let resource_type = ResourceType::new("RubiMinterV2");

        let by_name = resolve_function(Some(&artifact), &resource_type, "withdrawalFee", 2).unwrap();
        assert_eq!(by_name.signature(), "withdrawalFee(uint256,uint256)");

        let by_signature =
            resolve_function(None, &resource_type, "transfer(address,uint256)", 2).unwrap();
        assert_eq!(by_signature.selector().as_slice(), &[0xa9, 0x05, 0x9c, 0xbb]);

        let wrong_arity = resolve_function(Some(&artifact), &resource_type, "withdrawalFee", 1);
        assert!(matches!(wrong_arity, Err(GatewayError::UnknownMethod { arity: 1, .. })));

        let unknown = resolve_function(Some(&artifact), &resource_type, "getReward", 0);
        assert!(matches!(unknown, Err(GatewayError::UnknownMethod { .. })));
    }

    #[test]
    fn test_encode_call_coerces_integers() {
        let artifact = minter();
        let function = resolve_function(
            Some(&artifact),
            &ResourceType::new("RubiMinterV2"),
            "withdrawalFee",
            2,
        )
        .unwrap();

        let data = encode_call(&function, &[ArgValue::Int(1000), ArgValue::Int(1)]).unwrap();
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[..4], function.selector().as_slice());
        assert_eq!(U256::from_be_slice(&data[4..36]), U256::from(1000));
        assert_eq!(U256::from_be_slice(&data[36..]), U256::from(1));
    }

    #[test]
    fn test_coerce_rejects_mismatched_value() {
        let err = coerce(&DynSolType::Address, &ArgValue::Text("rubi".to_string())).unwrap_err();
        assert!(err.to_string().contains("cannot use 'rubi' as address"));
    }

    #[test]
    fn test_decode_output() {
        let function = Function::parse("withdrawalFee(uint256,uint256) returns (uint256)").unwrap();
        let encoded = DynSolValue::Tuple(vec![DynSolValue::Uint(U256::from(7), 256)]).abi_encode_params();

        assert_eq!(decode_output(&function, &encoded).unwrap(), vec!["7".to_string()]);

        let no_outputs = Function::parse("initialize()").unwrap();
        assert!(decode_output(&no_outputs, &[]).unwrap().is_empty());
    }
}
