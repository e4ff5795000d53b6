//! End-to-end scans against loopback addresses.

#[cfg(test)]
mod scan;
