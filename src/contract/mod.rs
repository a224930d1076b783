pub mod store;

pub use store::{
    ContractFileInfo, ContractStore, ContractStoreError, FileDecryptionStatus, FilePartInfo,
    RangeDownloadContext,
};
