use crate::error::BasaltResult;
use crate::types::{AlgDataType, PolyType};

/// Rule computing the result type of a call from its operand types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnTypeInference {
    /// Always this type.
    Explicit(AlgDataType),
    /// BOOLEAN, nullable if any operand is nullable.
    BooleanNullable,
    /// Type of the first operand.
    Arg0,
    /// Type of the first operand, forced nullable.
    Arg0ForceNullable,
    /// Least restrictive type of all operands.
    LeastRestrictive,
    /// BIGINT NOT NULL, used by counting aggregates.
    Count,
}

impl ReturnTypeInference {
    pub fn infer(&self, operand_types: &[AlgDataType]) -> BasaltResult<AlgDataType> {
        let any_nullable = operand_types.iter().any(|t| t.is_nullable());
        match self {
            ReturnTypeInference::Explicit(ty) => Ok(ty.clone()),
            ReturnTypeInference::BooleanNullable => {
                Ok(AlgDataType::new(PolyType::Boolean, any_nullable))
            }
            ReturnTypeInference::Arg0 => match operand_types.first() {
                Some(ty) => Ok(ty.clone()),
                None => bail_internal!("Arg0 inference on call without operands"),
            },
            ReturnTypeInference::Arg0ForceNullable => match operand_types.first() {
                Some(ty) => Ok(ty.with_nullable(true)),
                None => bail_internal!("Arg0 inference on call without operands"),
            },
            ReturnTypeInference::LeastRestrictive => {
                match AlgDataType::least_restrictive(operand_types) {
                    Some(ty) => Ok(ty),
                    None => Ok(AlgDataType::new(PolyType::Any, any_nullable)),
                }
            }
            ReturnTypeInference::Count => Ok(AlgDataType::not_null(PolyType::Bigint)),
        }
    }
}
