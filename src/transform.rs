use clap::ValueEnum;

use crate::graph::NodeId;
use crate::util::hex_width;

const DIGIT_SQUARES: [u32; 16] = [
    0, 1, 4, 9, 16, 25, 36, 49, 64, 81, 100, 121, 144, 169, 196, 225,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TransformKind {
    /// Sum of the squares of the id's hexadecimal digits.
    DigitSquares,
    /// `id * id` modulo the domain size.
    SquareMod,
}

impl TransformKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::DigitSquares => "digit-squares",
            Self::SquareMod => "square-mod",
        }
    }

    pub fn for_domain(self, domain_size: u32) -> Box<dyn Fn(NodeId) -> NodeId + Send + Sync> {
        match self {
            Self::DigitSquares => {
                let digits = hex_width(domain_size);
                Box::new(move |id| digit_square_sum(id, digits))
            }
            Self::SquareMod => Box::new(move |id| square_mod(id, domain_size)),
        }
    }
}

/// Sums the squared value of the lowest `digits` hex digits of `id`.
///
/// Leading zero digits contribute nothing, so padding only matters for the
/// digit count, never for the result.
pub fn digit_square_sum(id: NodeId, digits: usize) -> NodeId {
    let mut rest = id;
    let mut sum = 0;
    for _ in 0..digits {
        sum += DIGIT_SQUARES[(rest & 0xF) as usize];
        rest >>= 4;
    }
    sum
}

pub fn square_mod(id: NodeId, domain_size: u32) -> NodeId {
    let id = u64::from(id);
    ((id * id) % u64::from(domain_size)) as NodeId
}
