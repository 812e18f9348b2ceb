//! Reply Composer
//!
//! Literal outbound message templates. The wording (including emoji and
//! trailing markdown spaces) is frozen — existing users rely on it, so the
//! templates are reproduced byte-for-byte from the deployed bot.

use crate::report::Report;

/// Content recorded for a photo-only report.
pub const PHOTO_ONLY_PLACEHOLDER: &str = "Laporan dengan foto tanpa teks";

pub const MAIN_MENU: &str = "👋 Selamat datang di *Chatbot DISPERKIM Kota Semarang*  \nSilakan pilih layanan:\n1️⃣ Laporan Pohon Tumbang\n2️⃣ Laporan Taman Kota\n3️⃣ Informasi Lainnya";

pub const TREE_REPORT_FORMAT: &str = "🌳 *Laporan Pohon Tumbang*  \nFormat:\nLOKASI: [alamat/lokasi]\nWAKTU: [tanggal & jam]\nKONTAK: [nomor HP]\nKETERANGAN: [opsional]\n📸 Anda juga bisa kirim foto kondisi pohon.";

pub const PARK_REPORT_FORMAT: &str = "🌺 *Laporan Taman Kota*  \nFormat:\nTAMAN: [nama/alamat taman]\nMASALAH: [fasilitas rusak/kebersihan/lainnya]\nKONTAK: [nomor HP]\nKETERANGAN: [opsional]\n📸 Anda juga bisa kirim foto kondisi taman.";

pub const INFO: &str = "ℹ️ Informasi DISPERKIM Kota Semarang:  \n🌐 Website: https://disperkim.semarangkota.go.id  \n☎️ Call Center: (024) 123456  \n📧 Email: disperkim@semarangkota.go.id  \n\nKetik *menu* untuk kembali.";

pub const NOT_FOUND: &str = "❌ Nomor laporan tidak ditemukan.";

pub const FALLBACK: &str = "🙏 Maaf, saya tidak mengerti.  \nKetik *menu* untuk melihat pilihan.";

/// Confirmation sent right after a report is recorded.
pub fn confirmation(id: u64) -> String {
    format!(
        "✅ Laporan Anda dicatat.  \nNomor laporan: *#{id}*  \nGunakan perintah: CEK #{id} untuk cek status."
    )
}

/// Status reply for a `cek #<id>` query.
pub fn status(report: &Report) -> String {
    format!(
        "📌 Status laporan *#{}*:  \nIsi: {}  \nStatus: *{}*",
        report.id, report.content, report.status
    )
}

/// Caption attached when the stored photo is sent back.
pub fn photo_caption(id: u64) -> String {
    format!("Foto laporan #{id}")
}

/// Templates of the Cloud API (spreadsheet) variant. Different deployment,
/// different wording — also frozen.
pub mod cloud {
    pub const PARK_FORMAT: &str =
        "Silakan isi laporan taman dengan format:\nNAMA; LOKASI; KETERANGAN";

    pub const TREE_FORMAT: &str =
        "Silakan isi laporan pohon tumbang dengan format:\nNAMA; LOKASI; KETERANGAN";

    pub const CONTACT: &str =
        "Kontak DISPERKIM Kota Semarang:\n📍 Jl. Pemuda No.148, Semarang\n☎️ (024) xxx-xxxx";

    pub const GREETING: &str = "Halo 👋, Anda terhubung dengan DISPERKIM Kota Semarang.\nKetik angka:\n1️⃣ Laporan Taman\n2️⃣ Laporan Pohon Tumbang\n3️⃣ Informasi Kontak";

    pub fn thanks(ticket: &str) -> String {
        format!("✅ Terima kasih, laporan Anda sudah kami terima.\nNomor Tiket: {ticket}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportStatus;
    use chrono::Utc;

    #[test]
    fn test_main_menu_lists_three_options() {
        assert!(MAIN_MENU.contains("1️⃣"));
        assert!(MAIN_MENU.contains("2️⃣"));
        assert!(MAIN_MENU.contains("3️⃣"));
    }

    #[test]
    fn test_confirmation_contains_id_and_cek_hint() {
        let text = confirmation(1);
        assert!(text.contains("*#1*"));
        assert!(text.contains("CEK #1"));
    }

    #[test]
    fn test_status_reply() {
        let report = Report {
            id: 4,
            sender: "s".into(),
            content: "LOKASI: Jl. A".into(),
            attachment_ref: None,
            status: ReportStatus::AwaitingVerification,
            created_at: Utc::now(),
        };
        let text = status(&report);
        assert!(text.contains("*#4*"));
        assert!(text.contains("LOKASI: Jl. A"));
        assert!(text.contains("*Menunggu verifikasi*"));
    }

    #[test]
    fn test_cloud_thanks_carries_ticket() {
        assert!(cloud::thanks("DISP-123").ends_with("Nomor Tiket: DISP-123"));
    }
}
