mod record;

pub(crate) use self::record::{NewScanRow, ScanRow, VerdictRow};
