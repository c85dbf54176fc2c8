use crate::graph::NodeId;

pub fn format_count(count: u64) -> String {
    const UNITS: [&str; 4] = ["", "K", "M", "G"];

    let mut value = count as f64;
    let mut unit = 0usize;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{count}")
    } else {
        format!("{value:.2}{}", UNITS[unit])
    }
}

/// Number of hexadecimal digits needed to print the largest id of a domain.
pub fn hex_width(domain_size: u32) -> usize {
    let mut largest = domain_size.saturating_sub(1);
    let mut width = 1usize;
    while largest >= 0x10 {
        largest >>= 4;
        width += 1;
    }
    width
}

pub fn format_id(id: NodeId, width: usize) -> String {
    format!("{id:0width$X}")
}
