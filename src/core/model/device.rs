//! 비동기 디바이스 스트림과 지연 동기화 버퍼

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::core::error::Result;

/// 호스트/디바이스 간 복사를 비동기로 발행하는 스트림
pub trait DeviceStream: Send + Sync {
    /// 발행된 모든 복사가 끝날 때까지 대기
    fn synchronize(&self) -> Result<()>;
}

/// 동기 호스트 메모리 스트림 (동기화가 필요 없음)
#[derive(Debug, Default, Clone, Copy)]
pub struct HostStream;

impl DeviceStream for HostStream {
    fn synchronize(&self) -> Result<()> {
        Ok(())
    }
}

/// 비동기 전송 중일 수 있는 값
///
/// pending -> ready 단방향 전이. 첫 읽기에서 한 번만 동기화한다.
pub struct DeviceResident<T> {
    value: T,
    stream: Option<Arc<dyn DeviceStream>>,
    ready: OnceCell<()>,
}

impl<T> DeviceResident<T> {
    /// 이미 호스트에서 읽을 수 있는 값
    pub fn ready(value: T) -> Self {
        Self {
            value,
            stream: None,
            ready: OnceCell::with_value(()),
        }
    }

    /// 스트림에 전송이 발행된 값
    pub fn pending(value: T, stream: Arc<dyn DeviceStream>) -> Self {
        Self {
            value,
            stream: Some(stream),
            ready: OnceCell::new(),
        }
    }

    /// 스트림이 있으면 pending, 없으면 ready
    pub fn issue(value: T, stream: Option<&Arc<dyn DeviceStream>>) -> Self {
        match stream {
            Some(stream) => Self::pending(value, Arc::clone(stream)),
            None => Self::ready(value),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.get().is_some()
    }

    /// 필요하면 동기화 후 값 참조
    pub fn get(&self) -> Result<&T> {
        self.ready.get_or_try_init(|| match &self.stream {
            Some(stream) => {
                log::trace!("deferred device synchronization");
                stream.synchronize()
            }
            None => Ok(()),
        })?;
        Ok(&self.value)
    }

    /// 필요하면 동기화 후 값 소유권 이전
    pub fn into_inner(self) -> Result<T> {
        self.get()?;
        Ok(self.value)
    }
}
