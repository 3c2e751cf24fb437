//! Flash programming over PAGEWRITE and the validate commands.

use std::ops::ControlFlow;

use log::{debug, info, warn};

use crate::checksum::crc32;
use crate::error::NurError;
use crate::protocol::{NUR_APP_FIRST_PAGE, NUR_BL_FIRST_PAGE, NUR_FLASH_PAGE_SIZE, cmd};
use crate::reader::NurReader;
use crate::transport::RfidTransport;

/// Programming state passed to the progress callback
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    /// Page relative to the first page; `-1` before the first write and `total_pages` when done
    pub current_page: i32,
    pub total_pages: u32,
    /// Set on the final call when programming failed
    pub error: Option<&'a NurError>,
}

/// Encode one PAGEWRITE payload: page number, page CRC and the CRC-scrambled data.
///
/// `chunk` shorter than a page is padded with 0xFF.
pub(crate) fn encode_page(page: u16, chunk: &[u8]) -> Vec<u8> {
    let mut data = [0xFFu8; NUR_FLASH_PAGE_SIZE];
    let len = chunk.len().min(NUR_FLASH_PAGE_SIZE);
    data[..len].copy_from_slice(&chunk[..len]);

    let crc = crc32(0, &data);
    let mut payload = Vec::with_capacity(6 + NUR_FLASH_PAGE_SIZE);
    payload.extend_from_slice(&page.to_le_bytes());
    payload.extend_from_slice(&crc.to_le_bytes());
    for dword in data.chunks_exact(4) {
        let value = u32::from_le_bytes([dword[0], dword[1], dword[2], dword[3]]) ^ crc;
        payload.extend_from_slice(&value.to_le_bytes());
    }
    payload
}

impl<T: RfidTransport> NurReader<T> {
    /// Program the application image
    pub fn program_app<F>(&mut self, image: &[u8], progress: F) -> Result<(), NurError>
    where
        F: FnMut(&Progress<'_>) -> ControlFlow<()>,
    {
        self.program_buffer(image, NUR_APP_FIRST_PAGE, Some(cmd::APPVALIDATE), progress)
    }

    /// Program the bootloader image
    pub fn program_bootloader<F>(&mut self, image: &[u8], progress: F) -> Result<(), NurError>
    where
        F: FnMut(&Progress<'_>) -> ControlFlow<()>,
    {
        self.program_buffer(image, NUR_BL_FIRST_PAGE, Some(cmd::BLVALIDATE), progress)
    }

    /// Write `image` page by page starting at `start_page`, then validate it.
    ///
    /// # Arguments
    /// * `image` - Raw binary, padded to whole pages with 0xFF
    /// * `start_page` - First flash page
    /// * `validate_cmd` - APPVALIDATE or BLVALIDATE; `None` skips validation
    /// * `progress` - Called before the first page, before every page and once at the end.
    ///   Returning `Break` aborts with [`NurError::Aborted`].
    pub fn program_buffer<F>(
        &mut self,
        image: &[u8],
        start_page: u16,
        validate_cmd: Option<u8>,
        mut progress: F,
    ) -> Result<(), NurError>
    where
        F: FnMut(&Progress<'_>) -> ControlFlow<()>,
    {
        let total_pages = image.len().div_ceil(NUR_FLASH_PAGE_SIZE) as u32;
        let mut state = Progress {
            current_page: -1,
            total_pages,
            error: None,
        };
        if progress(&state).is_break() {
            return Err(NurError::Aborted);
        }

        info!(
            "Programming {} bytes ({} pages) from page {}",
            image.len(),
            total_pages,
            start_page
        );

        let result = self.write_pages(image, start_page, validate_cmd, &mut state, &mut progress);
        match &result {
            Ok(()) => {
                state.current_page = total_pages as i32;
                let _ = progress(&state);
                info!("Programming complete");
            }
            Err(NurError::Aborted) => {}
            Err(e) => {
                let failed = Progress { error: Some(e), ..state };
                let _ = progress(&failed);
            }
        }
        result
    }

    fn write_pages<F>(
        &mut self,
        image: &[u8],
        start_page: u16,
        validate_cmd: Option<u8>,
        state: &mut Progress<'_>,
        progress: &mut F,
    ) -> Result<(), NurError>
    where
        F: FnMut(&Progress<'_>) -> ControlFlow<()>,
    {
        for (index, chunk) in image.chunks(NUR_FLASH_PAGE_SIZE).enumerate() {
            state.current_page = index as i32;
            if progress(&*state).is_break() {
                warn!("Programming aborted at page {}", index);
                return Err(NurError::Aborted);
            }

            let page = start_page.wrapping_add(index as u16);
            let payload = encode_page(page, chunk);
            self.retry(cmd::PAGEWRITE, &payload)?;
            debug!("Page {} written", page);
        }

        if let Some(validate_cmd) = validate_cmd {
            let mut payload = Vec::with_capacity(8);
            payload.extend_from_slice(&(image.len() as u32).to_le_bytes());
            payload.extend_from_slice(&crc32(0, image).to_le_bytes());
            self.retry(validate_cmd, &payload)?;
        }
        Ok(())
    }

    fn retry(&mut self, cmd: u8, payload: &[u8]) -> Result<(), NurError> {
        let attempts = self.config().program_retries.max(1);
        let mut attempt = 1;
        loop {
            match self.simple_command(cmd, payload) {
                Ok(_) => return Ok(()),
                Err(e) if attempt < attempts => {
                    warn!("Command 0x{:02X} attempt {}/{} failed: {}", cmd, attempt, attempts, e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unscramble(payload: &[u8]) -> (u16, u32, Vec<u8>) {
        let page = u16::from_le_bytes([payload[0], payload[1]]);
        let crc = u32::from_le_bytes([payload[2], payload[3], payload[4], payload[5]]);
        let data = payload[6..]
            .chunks_exact(4)
            .flat_map(|d| (u32::from_le_bytes([d[0], d[1], d[2], d[3]]) ^ crc).to_le_bytes())
            .collect();
        (page, crc, data)
    }

    #[test]
    fn test_encode_full_page() {
        let chunk: Vec<u8> = (0..=255u8).collect();
        let payload = encode_page(300, &chunk);
        assert_eq!(payload.len(), 6 + NUR_FLASH_PAGE_SIZE);

        let (page, crc, data) = unscramble(&payload);
        assert_eq!(page, 300);
        assert_eq!(crc, crc32(0, &chunk));
        assert_eq!(data, chunk);
    }

    #[test]
    fn test_encode_short_page_is_padded() {
        let payload = encode_page(0, &[0x12, 0x34, 0x56]);
        let (_, crc, data) = unscramble(&payload);

        let mut expected = vec![0xFFu8; NUR_FLASH_PAGE_SIZE];
        expected[..3].copy_from_slice(&[0x12, 0x34, 0x56]);
        assert_eq!(data, expected);
        assert_eq!(crc, crc32(0, &expected));
    }

    #[test]
    fn test_zero_page_scrambles_to_crc() {
        let chunk = [0u8; NUR_FLASH_PAGE_SIZE];
        let payload = encode_page(1, &chunk);
        let crc = crc32(0, &chunk);
        assert_eq!(&payload[6..10], &crc.to_le_bytes());
    }
}
